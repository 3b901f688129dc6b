//! Network-facing types and seams.
//!
//! `Fetch` covers plain GETs (shell assets, dynamic content); `RemoteApi`
//! covers the mutation endpoints the sync coordinator replays against.
//! Both are traits so tests run without a live backend.

mod fetch;
mod remote;
mod types;

pub use fetch::{Fetch, HttpFetcher};
pub use remote::{
  ApiOutcome, CommentRequest, CommentResponse, HttpRemoteApi, LoginRequest, LoginResponse,
  RemoteApi,
};
pub use types::{Method, Request, ResponseSnapshot};
