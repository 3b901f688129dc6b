//! Per-request routing between cache and network.
//!
//! Only GETs are intercepted. API-prefixed requests are network-only and
//! synthesize a 503 when the network is down; everything else is
//! cache-first with a root-document fallback, so a single-page router can
//! still render an offline state. Every handled request ends in a valid
//! response object.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheManager, CacheStore};
use crate::net::{Fetch, Method, Request, ResponseSnapshot};

pub struct RequestInterceptor<S: CacheStore, F: Fetch + ?Sized> {
  cache: CacheManager<S>,
  fetch: Arc<F>,
  origin: Url,
  api_route_prefix: String,
  offline_message: String,
}

impl<S: CacheStore, F: Fetch + ?Sized> RequestInterceptor<S, F> {
  pub fn new(
    cache: CacheManager<S>,
    fetch: Arc<F>,
    origin: Url,
    api_route_prefix: String,
    offline_message: String,
  ) -> Self {
    Self {
      cache,
      fetch,
      origin,
      api_route_prefix,
      offline_message,
    }
  }

  /// Handle one outbound request.
  ///
  /// Returns `None` for non-GET requests: mutations pass through untouched
  /// and never involve any cache namespace.
  pub async fn handle(&self, request: &Request) -> Result<Option<ResponseSnapshot>> {
    if request.method != Method::Get {
      return Ok(None);
    }

    if self.is_api_route(request) {
      return Ok(Some(self.network_only(request).await?));
    }

    Ok(Some(self.cache_first(request).await?))
  }

  /// Prefix match on a segment boundary, so `/apiary` is not an API route.
  fn is_api_route(&self, request: &Request) -> bool {
    match request.url.path().strip_prefix(&self.api_route_prefix) {
      Some(rest) => rest.is_empty() || rest.starts_with('/'),
      None => false,
    }
  }

  /// API routes: never cached. A transport failure becomes a synthesized
  /// 503 with a fixed-shape JSON body, so the caller still gets a response.
  async fn network_only(&self, request: &Request) -> Result<ResponseSnapshot> {
    match self.fetch.get(&request.url).await {
      Ok(resp) => Ok(resp),
      Err(e) => {
        debug!("API request to {} failed offline: {}", request.url, e);
        Ok(ResponseSnapshot::service_unavailable(&self.offline_message))
      }
    }
  }

  /// Everything else: cache hit wins; a miss goes to the network and is
  /// stored best-effort; a miss with no network falls back to the cached
  /// root document. An uncached root document propagates the failure.
  async fn cache_first(&self, request: &Request) -> Result<ResponseSnapshot> {
    if let Some(hit) = self.cache.lookup(request)? {
      return Ok(hit);
    }

    match self.fetch.get(&request.url).await {
      Ok(resp) => {
        self.cache.store_dynamic(request, &resp);
        Ok(resp)
      }
      Err(e) => {
        warn!("Fetch of {} failed, falling back to root document: {}", request.url, e);
        let root = Request::get(self.origin.clone());
        match self.cache.lookup(&root)? {
          Some(root_doc) => Ok(root_doc),
          None => Err(e),
        }
      }
    }
  }
}
