use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::types::ResponseSnapshot;

/// Plain GET fetcher. `Err` means transport failure (no response at all);
/// HTTP error statuses come back as `Ok` snapshots.
#[async_trait]
pub trait Fetch: Send + Sync {
  async fn get(&self, url: &Url) -> Result<ResponseSnapshot>;
}

/// reqwest-backed fetcher used in production.
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Self {
    Self {
      client: reqwest::Client::new(),
    }
  }
}

impl Default for HttpFetcher {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Fetch for HttpFetcher {
  async fn get(&self, url: &Url) -> Result<ResponseSnapshot> {
    let resp = self
      .client
      .get(url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?;

    let status = resp.status().as_u16();
    let content_type = resp
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let body = resp
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body from {}: {}", url, e))?
      .to_vec();

    Ok(ResponseSnapshot {
      status,
      content_type,
      body,
    })
  }
}
