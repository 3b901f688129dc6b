//! Namespace lifecycle and lookup policy over a cache storage backend.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::net::{Fetch, Request, ResponseSnapshot};

use super::storage::CacheStore;

/// The two current namespace names, version suffixes included.
#[derive(Debug, Clone)]
pub struct CacheNames {
  pub shell: String,
  pub dynamic: String,
}

/// Owns the shell and dynamic namespaces and their version cutover.
pub struct CacheManager<S: CacheStore> {
  storage: Arc<S>,
  names: CacheNames,
}

impl<S: CacheStore> CacheManager<S> {
  pub fn new(storage: Arc<S>, names: CacheNames) -> Self {
    Self { storage, names }
  }

  /// Precache the shell manifest into the current shell namespace.
  ///
  /// Every asset is attempted; a per-asset failure (bad URL, transport
  /// error, non-2xx, storage error) is logged and skipped. Install never
  /// aborts on a partial failure.
  pub async fn install<F: Fetch + ?Sized>(
    &self,
    fetch: &F,
    origin: &Url,
    assets: &[String],
  ) -> Result<()> {
    self.storage.open_namespace(&self.names.shell)?;

    for asset in assets {
      let url = match origin.join(asset) {
        Ok(url) => url,
        Err(e) => {
          warn!("Skipping unresolvable shell asset {}: {}", asset, e);
          continue;
        }
      };

      match fetch.get(&url).await {
        Ok(resp) if resp.is_success() => {
          if let Err(e) = self.storage.put(&self.names.shell, &Request::get(url.clone()), &resp) {
            warn!("Failed to store shell asset {}: {}", url, e);
          }
        }
        Ok(resp) => {
          warn!("Shell asset {} answered {}, not cached", url, resp.status);
        }
        Err(e) => {
          warn!("Failed to precache shell asset {}: {}", url, e);
        }
      }
    }

    Ok(())
  }

  /// Version cutover: delete every namespace that is not one of the two
  /// current ones. Idempotent; running it twice leaves exactly the current
  /// shell and dynamic namespaces.
  pub fn activate(&self) -> Result<()> {
    self.storage.open_namespace(&self.names.shell)?;
    self.storage.open_namespace(&self.names.dynamic)?;

    for namespace in self.storage.list_namespaces()? {
      if namespace != self.names.shell && namespace != self.names.dynamic {
        debug!("Deleting stale cache namespace {}", namespace);
        self.storage.delete_namespace(&namespace)?;
      }
    }

    Ok(())
  }

  /// First matching snapshot across shell then dynamic.
  pub fn lookup(&self, request: &Request) -> Result<Option<ResponseSnapshot>> {
    if let Some(hit) = self.storage.get(&self.names.shell, request)? {
      return Ok(Some(hit));
    }
    self.storage.get(&self.names.dynamic, request)
  }

  /// Best-effort store into the dynamic namespace. Only successful
  /// responses to http(s) requests are kept; storage failures are logged
  /// and swallowed.
  pub fn store_dynamic(&self, request: &Request, response: &ResponseSnapshot) {
    if !response.is_success() || !request.is_http() {
      return;
    }

    let stored = self
      .storage
      .open_namespace(&self.names.dynamic)
      .and_then(|_| self.storage.put(&self.names.dynamic, request, response));

    if let Err(e) = stored {
      debug!("Failed to cache response for {}: {}", request.url, e);
    }
  }
}

impl<S: CacheStore> Clone for CacheManager<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      names: self.names.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteCacheStore;
  use crate::store::Store;
  use async_trait::async_trait;
  use color_eyre::eyre::eyre;
  use std::sync::Mutex;

  fn manager() -> CacheManager<SqliteCacheStore> {
    let store = Arc::new(Store::open_in_memory().unwrap());
    CacheManager::new(
      Arc::new(SqliteCacheStore::new(store)),
      CacheNames {
        shell: "shell_v1.0".to_string(),
        dynamic: "dynamic_v1.0".to_string(),
      },
    )
  }

  /// Fetcher that serves canned bodies and records every requested URL.
  struct ScriptedFetch {
    requests: Mutex<Vec<String>>,
    missing: Vec<String>,
  }

  impl ScriptedFetch {
    fn new(missing: &[&str]) -> Self {
      Self {
        requests: Mutex::new(Vec::new()),
        missing: missing.iter().map(|s| s.to_string()).collect(),
      }
    }

    fn requested(&self) -> Vec<String> {
      self.requests.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl Fetch for ScriptedFetch {
    async fn get(&self, url: &Url) -> Result<ResponseSnapshot> {
      self.requests.lock().unwrap().push(url.path().to_string());
      if self.missing.contains(&url.path().to_string()) {
        return Err(eyre!("connection refused"));
      }
      Ok(ResponseSnapshot {
        status: 200,
        content_type: Some("text/html".to_string()),
        body: format!("body of {}", url.path()).into_bytes(),
      })
    }
  }

  fn origin() -> Url {
    Url::parse("http://localhost:5173").unwrap()
  }

  fn get(path: &str) -> Request {
    Request::get(origin().join(path).unwrap())
  }

  #[tokio::test]
  async fn install_attempts_every_asset_despite_failures() {
    let manager = manager();
    let fetch = ScriptedFetch::new(&["/broken.css"]);
    let assets = vec![
      "/".to_string(),
      "/broken.css".to_string(),
      "/index.html".to_string(),
    ];

    manager.install(&fetch, &origin(), &assets).await.unwrap();

    // The failing asset did not stop the ones after it
    assert_eq!(fetch.requested(), vec!["/", "/broken.css", "/index.html"]);
    assert!(manager.lookup(&get("/index.html")).unwrap().is_some());
    assert!(manager.lookup(&get("/broken.css")).unwrap().is_none());
  }

  #[tokio::test]
  async fn activate_prunes_stale_namespaces_idempotently() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let storage = Arc::new(SqliteCacheStore::new(store));
    storage.open_namespace("shell_v0.9").unwrap();
    storage.open_namespace("dynamic_v0.9").unwrap();

    let manager = CacheManager::new(
      Arc::clone(&storage),
      CacheNames {
        shell: "shell_v1.0".to_string(),
        dynamic: "dynamic_v1.0".to_string(),
      },
    );

    manager.activate().unwrap();
    manager.activate().unwrap();

    assert_eq!(
      storage.list_namespaces().unwrap(),
      vec!["dynamic_v1.0", "shell_v1.0"]
    );
  }

  #[tokio::test]
  async fn lookup_prefers_shell_over_dynamic() {
    let manager = manager();
    let fetch = ScriptedFetch::new(&[]);
    manager
      .install(&fetch, &origin(), &["/index.html".to_string()])
      .await
      .unwrap();

    // Same key stored in dynamic with a different body
    let req = get("/index.html");
    manager.store_dynamic(
      &req,
      &ResponseSnapshot {
        status: 200,
        content_type: None,
        body: b"dynamic copy".to_vec(),
      },
    );

    let hit = manager.lookup(&req).unwrap().unwrap();
    assert_eq!(hit.body, b"body of /index.html");
  }

  #[test]
  fn store_dynamic_rejects_errors_and_non_http() {
    let manager = manager();

    let failed = ResponseSnapshot {
      status: 404,
      content_type: None,
      body: Vec::new(),
    };
    let ok = ResponseSnapshot {
      status: 200,
      content_type: None,
      body: b"x".to_vec(),
    };

    let req = get("/page");
    manager.store_dynamic(&req, &failed);
    assert!(manager.lookup(&req).unwrap().is_none());

    let ext = Request::get(Url::parse("chrome-extension://abc/page").unwrap());
    manager.store_dynamic(&ext, &ok);
    assert!(manager.lookup(&ext).unwrap().is_none());

    manager.store_dynamic(&req, &ok);
    assert!(manager.lookup(&req).unwrap().is_some());
  }
}
