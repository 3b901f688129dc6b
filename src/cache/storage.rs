//! Cache storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::params;
use std::sync::Arc;

use crate::net::{Request, ResponseSnapshot};
use crate::store::Store;

/// Storage backend for namespaced response snapshots.
///
/// Keys are (namespace, method, absolute URL). Deleting a namespace drops
/// every snapshot stored under it.
pub trait CacheStore: Send + Sync {
  /// Create the namespace if it does not exist yet.
  fn open_namespace(&self, name: &str) -> Result<()>;

  /// All namespaces currently present, in name order.
  fn list_namespaces(&self) -> Result<Vec<String>>;

  /// Delete a namespace and everything stored under it.
  fn delete_namespace(&self, name: &str) -> Result<()>;

  /// Store a snapshot, replacing any previous one for the same key.
  fn put(&self, namespace: &str, request: &Request, response: &ResponseSnapshot) -> Result<()>;

  /// Look up a stored snapshot.
  fn get(&self, namespace: &str, request: &Request) -> Result<Option<ResponseSnapshot>>;
}

/// SQLite-backed cache storage over the shared persistent store.
pub struct SqliteCacheStore {
  store: Arc<Store>,
}

impl SqliteCacheStore {
  pub fn new(store: Arc<Store>) -> Self {
    Self { store }
  }
}

impl CacheStore for SqliteCacheStore {
  fn open_namespace(&self, name: &str) -> Result<()> {
    let conn = self.store.lock()?;
    conn
      .execute(
        "INSERT OR IGNORE INTO cache_namespaces (name) VALUES (?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open cache namespace {}: {}", name, e))?;

    Ok(())
  }

  fn list_namespaces(&self) -> Result<Vec<String>> {
    let conn = self.store.lock()?;
    let mut stmt = conn
      .prepare("SELECT name FROM cache_namespaces ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare namespace query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache namespaces: {}", e))?
      .collect::<std::result::Result<Vec<String>, _>>()
      .map_err(|e| eyre!("Failed to read namespace row: {}", e))?;

    Ok(names)
  }

  fn delete_namespace(&self, name: &str) -> Result<()> {
    // cached_responses rows go with it (ON DELETE CASCADE)
    let conn = self.store.lock()?;
    conn
      .execute("DELETE FROM cache_namespaces WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete cache namespace {}: {}", name, e))?;

    Ok(())
  }

  fn put(&self, namespace: &str, request: &Request, response: &ResponseSnapshot) -> Result<()> {
    let conn = self.store.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO cached_responses
           (namespace, method, url, status, content_type, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          namespace,
          request.method.as_str(),
          request.url.as_str(),
          response.status,
          response.content_type,
          response.body,
        ],
      )
      .map_err(|e| eyre!("Failed to store response for {}: {}", request.url, e))?;

    Ok(())
  }

  fn get(&self, namespace: &str, request: &Request) -> Result<Option<ResponseSnapshot>> {
    let conn = self.store.lock()?;
    let mut stmt = conn
      .prepare(
        "SELECT status, content_type, body FROM cached_responses
         WHERE namespace = ? AND method = ? AND url = ?",
      )
      .map_err(|e| eyre!("Failed to prepare cache lookup: {}", e))?;

    let result = stmt
      .query_row(
        params![namespace, request.method.as_str(), request.url.as_str()],
        |row| {
          Ok(ResponseSnapshot {
            status: row.get(0)?,
            content_type: row.get(1)?,
            body: row.get(2)?,
          })
        },
      )
      .ok();

    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn store() -> SqliteCacheStore {
    SqliteCacheStore::new(Arc::new(Store::open_in_memory().unwrap()))
  }

  fn request(url: &str) -> Request {
    Request::get(Url::parse(url).unwrap())
  }

  fn snapshot(body: &str) -> ResponseSnapshot {
    ResponseSnapshot {
      status: 200,
      content_type: Some("text/html".to_string()),
      body: body.as_bytes().to_vec(),
    }
  }

  #[test]
  fn put_then_get_round_trips() {
    let cache = store();
    cache.open_namespace("shell_v1.0").unwrap();

    let req = request("https://example.com/index.html");
    cache.put("shell_v1.0", &req, &snapshot("<html>")).unwrap();

    let hit = cache.get("shell_v1.0", &req).unwrap().unwrap();
    assert_eq!(hit.status, 200);
    assert_eq!(hit.body, b"<html>");

    // Same key, different namespace: miss
    cache.open_namespace("dynamic_v1.0").unwrap();
    assert!(cache.get("dynamic_v1.0", &req).unwrap().is_none());
  }

  #[test]
  fn put_replaces_previous_snapshot() {
    let cache = store();
    cache.open_namespace("dynamic_v1.0").unwrap();

    let req = request("https://example.com/feed");
    cache.put("dynamic_v1.0", &req, &snapshot("old")).unwrap();
    cache.put("dynamic_v1.0", &req, &snapshot("new")).unwrap();

    let hit = cache.get("dynamic_v1.0", &req).unwrap().unwrap();
    assert_eq!(hit.body, b"new");
  }

  #[test]
  fn deleting_a_namespace_drops_its_entries() {
    let cache = store();
    cache.open_namespace("shell_v0.9").unwrap();

    let req = request("https://example.com/app.css");
    cache.put("shell_v0.9", &req, &snapshot("body {}")).unwrap();

    cache.delete_namespace("shell_v0.9").unwrap();
    assert!(cache.list_namespaces().unwrap().is_empty());

    // Re-opening the namespace must not resurrect the entry
    cache.open_namespace("shell_v0.9").unwrap();
    assert!(cache.get("shell_v0.9", &req).unwrap().is_none());
  }

  #[test]
  fn open_namespace_is_idempotent() {
    let cache = store();
    cache.open_namespace("shell_v1.0").unwrap();
    cache.open_namespace("shell_v1.0").unwrap();

    assert_eq!(cache.list_namespaces().unwrap(), vec!["shell_v1.0"]);
  }
}
