use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use url::Url;

/// Login replay request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
  pub usuario: String,
  pub password: String,
}

/// Server-issued session state returned on a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
  pub token: String,
  pub usuario: String,
  pub correo: String,
  pub role: String,
}

/// Comment replay request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRequest {
  pub usuario: String,
  pub texto: String,
  pub fecha: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
  #[serde(rename = "insertedId")]
  pub inserted_id: String,
}

/// Outcome of a mutation attempt that reached the server.
///
/// Transport failures (no response at all) are `Err` at the call site,
/// which keeps the retain-vs-reject decision explicit for the caller.
#[derive(Debug, Clone)]
pub enum ApiOutcome<T> {
  Accepted(T),
  Rejected { status: u16 },
}

/// The remote mutation endpoints drained by the sync coordinator.
#[async_trait]
pub trait RemoteApi: Send + Sync {
  async fn login(&self, req: &LoginRequest) -> Result<ApiOutcome<LoginResponse>>;

  async fn submit_comment(&self, req: &CommentRequest) -> Result<ApiOutcome<CommentResponse>>;

  /// Fire-and-forget push trigger sent after a successful login replay.
  async fn send_push(&self, usuario: &str) -> Result<()>;
}

/// reqwest-backed API client.
pub struct HttpRemoteApi {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpRemoteApi {
  pub fn new(base_url: Url) -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url,
    }
  }

  async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(u16, Vec<u8>)> {
    let url = self
      .base_url
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))?;

    let resp = self
      .client
      .post(url.clone())
      .header(CONTENT_TYPE, "application/json")
      .body(serde_json::to_vec(body).map_err(|e| eyre!("Failed to serialize body: {}", e))?)
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", url, e))?;

    let status = resp.status().as_u16();
    let body = resp
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body from {}: {}", url, e))?
      .to_vec();

    Ok((status, body))
  }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
  async fn login(&self, req: &LoginRequest) -> Result<ApiOutcome<LoginResponse>> {
    let (status, body) = self.post_json("/api/login", req).await?;

    if (200..300).contains(&status) {
      let parsed: LoginResponse =
        serde_json::from_slice(&body).map_err(|e| eyre!("Failed to parse login response: {}", e))?;
      Ok(ApiOutcome::Accepted(parsed))
    } else {
      Ok(ApiOutcome::Rejected { status })
    }
  }

  async fn submit_comment(&self, req: &CommentRequest) -> Result<ApiOutcome<CommentResponse>> {
    let (status, body) = self.post_json("/api/post", req).await?;

    if (200..300).contains(&status) {
      let parsed: CommentResponse = serde_json::from_slice(&body)
        .map_err(|e| eyre!("Failed to parse comment response: {}", e))?;
      Ok(ApiOutcome::Accepted(parsed))
    } else {
      Ok(ApiOutcome::Rejected { status })
    }
  }

  async fn send_push(&self, usuario: &str) -> Result<()> {
    let body = serde_json::json!({ "usuario": usuario });
    self.post_json("/api/send-push", &body).await?;
    Ok(())
  }
}
