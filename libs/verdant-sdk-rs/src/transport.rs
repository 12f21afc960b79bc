//! HTTP transport abstraction.
//!
//! `ApiClient` talks to a [`Transport`] rather than to reqwest directly so the
//! retry and refresh logic can be exercised without a network.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// A request relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path beginning with `/`, optionally with a query string
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Path without the query string.
    pub fn endpoint(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Default connect timeout (TCP handshake + TLS).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout (total request/response time).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root including the version prefix, e.g. `https://api.example.com/api/v1`
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// Sends one request and returns the raw response. No retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError>;
}

#[cfg(feature = "client")]
pub use reqwest_transport::ReqwestTransport;

#[cfg(feature = "client")]
mod reqwest_transport {
    use async_trait::async_trait;

    use super::{ApiRequest, ApiResponse, ClientConfig, Method, Transport};
    use crate::error::ClientError;

    /// reqwest-backed transport with a cookie store, so the server's
    /// `access_token`/`refresh_token` cookies ride along like in a browser.
    pub struct ReqwestTransport {
        client: reqwest::Client,
        base_url: String,
    }

    impl ReqwestTransport {
        pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
            if config.base_url.is_empty() {
                return Err(ClientError::Config("base_url is required".into()));
            }

            let client = reqwest::Client::builder()
                .cookie_store(true)
                .connect_timeout(config.connect_timeout)
                .timeout(config.request_timeout)
                .build()?;

            Ok(Self {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
            })
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
            let url = format!("{}{}", self.base_url, request.path);
            let mut builder = match request.method {
                Method::Get => self.client.get(&url),
                Method::Post => self.client.post(&url),
                Method::Put => self.client.put(&url),
                Method::Patch => self.client.patch(&url),
                Method::Delete => self.client.delete(&url),
            };

            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?.to_vec();

            Ok(ApiResponse { status, body })
        }
    }
}
