//! Two-tier response cache with a versioned lifecycle.
//!
//! Responses live in named namespaces: a versioned shell namespace holding
//! the fixed boot assets, and a versioned dynamic namespace grown lazily
//! from successful GETs. Activation deletes every namespace that is not one
//! of the two current versions.

mod manager;
mod storage;

pub use manager::{CacheManager, CacheNames};
pub use storage::{CacheStore, SqliteCacheStore};
