//! Outbound HTTP abstraction.
//!
//! The request pipeline and the session manager talk to the platform through
//! the [`Transport`] trait so tests can script responses. Any HTTP status is a
//! successful transport outcome; only failures to get a response at all are
//! `TransportError`s.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub const AUTHORIZATION: &str = "authorization";
pub const ORGANIZATION_ID: &str = "x-organization-id";

/// A request relative to the platform API base URL (absolute URLs pass
/// through untouched).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Bearer token carried in the `Authorization` header, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header(AUTHORIZATION)?.strip_prefix("Bearer ")
    }
}

/// A response of any status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json_body(status: StatusCode, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Message for display: the body's `message` or `detail` field, else the
    /// canonical reason phrase.
    pub fn error_message(&self) -> String {
        let from_body = serde_json::from_str::<Value>(&self.body)
            .ok()
            .and_then(|v| {
                ["message", "detail"]
                    .iter()
                    .find_map(|field| v.get(field)?.as_str().map(str::to_string))
            })
            .filter(|m| !m.is_empty());

        from_body.unwrap_or_else(|| {
            self.status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError>;
}

/// `reqwest`-backed transport rooted at the platform API base URL.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let url = self.url_for(&request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Other(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Other(format!("failed to read response body: {e}")))?;

        tracing::debug!(method = %request.method, %url, status = status.as_u16(), "request completed");

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_names_are_case_insensitive() {
        let req = ApiRequest::get("/x").with_header("Authorization", "Bearer t");
        assert_eq!(req.header("AUTHORIZATION"), Some("Bearer t"));
        assert_eq!(req.bearer_token(), Some("t"));
    }

    #[test]
    fn error_message_prefers_message_then_detail_then_reason() {
        let with_message = RawResponse::json_body(
            StatusCode::BAD_REQUEST,
            &json!({ "success": false, "message": "email already registered" }),
        );
        assert_eq!(with_message.error_message(), "email already registered");

        let with_detail = RawResponse::json_body(
            StatusCode::UNAUTHORIZED,
            &json!({ "detail": "Invalid email or password" }),
        );
        assert_eq!(with_detail.error_message(), "Invalid email or password");

        let plain = RawResponse::new(StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(plain.error_message(), "Bad Gateway");
    }

    #[test]
    fn url_joining_respects_absolute_urls() {
        let transport =
            ReqwestTransport::new("http://localhost:8000/api/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            transport.url_for("/auth/me"),
            "http://localhost:8000/api/v1/auth/me"
        );
        assert_eq!(
            transport.url_for("auth/me"),
            "http://localhost:8000/api/v1/auth/me"
        );
        assert_eq!(
            transport.url_for("http://platform:8002/identity/users"),
            "http://platform:8002/identity/users"
        );
    }
}
