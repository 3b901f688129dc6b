use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use url::Url;

/// HTTP method of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
    }
  }
}

/// An outbound request as seen by the interceptor.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
}

impl Request {
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::Get,
      url,
    }
  }

  /// Only http/https requests are eligible for caching.
  pub fn is_http(&self) -> bool {
    matches!(self.url.scheme(), "http" | "https")
  }
}

/// A stored response: enough to answer the same request again later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl ResponseSnapshot {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Synthesized response for API calls made while offline. Callers always
  /// receive a response object, never a transport error.
  pub fn service_unavailable(message: &str) -> Self {
    let body = serde_json::json!({ "message": message }).to_string();
    Self {
      status: 503,
      content_type: Some("application/json".to_string()),
      body: body.into_bytes(),
    }
  }

  /// Deserialize the body as JSON.
  pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
    serde_json::from_slice(&self.body).map_err(|e| eyre!("Failed to parse response body: {}", e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn method_names_match_the_wire() {
    let expected = [
      (Method::Get, "GET"),
      (Method::Head, "HEAD"),
      (Method::Post, "POST"),
      (Method::Put, "PUT"),
      (Method::Patch, "PATCH"),
      (Method::Delete, "DELETE"),
    ];
    for (method, name) in expected {
      assert_eq!(method.as_str(), name);
    }
  }

  #[test]
  fn non_http_schemes_are_flagged() {
    let req = Request::get(Url::parse("chrome-extension://abcdef/page.html").unwrap());
    assert!(!req.is_http());

    let req = Request::get(Url::parse("https://example.com/").unwrap());
    assert!(req.is_http());
  }

  #[test]
  fn synthesized_offline_response_shape() {
    let resp = ResponseSnapshot::service_unavailable("no connectivity");
    assert_eq!(resp.status, 503);
    assert!(!resp.is_success());

    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["message"], "no connectivity");
  }
}
