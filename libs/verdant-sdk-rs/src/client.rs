//! Verdant API client.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use verdant_types::{ErrorCode, RefreshRequest, RefreshResponse};

use crate::error::ClientError;
use crate::refresh::RefreshGate;
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};

pub(crate) const LOGIN_PATH: &str = "/auth/login";
pub(crate) const REFRESH_PATH: &str = "/auth/refresh-token";

/// Endpoints whose 401 means bad credentials, never an expired session.
const NO_REFRESH_SUFFIXES: [&str; 2] = ["/login", "/refresh-token"];

/// HTTP client for the Verdant API.
///
/// Every request goes through [`ApiClient::execute`]: a 401 on a protected
/// endpoint triggers one shared session refresh and a single retry.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    access_token: RwLock<Option<String>>,
    refresh_gate: RefreshGate,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            access_token: RwLock::new(None),
            refresh_gate: RefreshGate::new(),
        }
    }

    /// Client over the reqwest transport.
    ///
    /// # Returns
    /// A configured `ApiClient` or `ClientError::Config` if `base_url` is empty.
    #[cfg(feature = "client")]
    pub fn connect(config: &crate::transport::ClientConfig) -> Result<Self, ClientError> {
        let transport = crate::transport::ReqwestTransport::new(config)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Bearer token attached to outgoing requests, if any.
    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_access_token(&self, token: Option<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(ApiRequest::new(Method::Get, path)).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body)?;
        self.request(ApiRequest::new(Method::Post, path).with_body(body))
            .await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body)?;
        self.request(ApiRequest::new(Method::Put, path).with_body(body))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(ApiRequest::new(Method::Delete, path)).await
    }

    /// Execute a request and decode the JSON response body.
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let response = self.execute(request).await?;
        decode(&response)
    }

    /// Execute a request with the 401 refresh-and-retry policy.
    ///
    /// # Returns
    /// The successful response, or:
    /// - `ClientError::Api` for non-2xx responses (including 401 on login/refresh)
    /// - `ClientError::RefreshFailed` if the shared refresh failed
    /// - `ClientError::Unauthorized` if the retry is rejected again
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let epoch = self.refresh_gate.epoch();
        let response = self.send(&request).await?;

        if response.status != 401 || !is_refreshable(request.endpoint()) {
            return into_result(response);
        }

        tracing::debug!(path = %request.endpoint(), "Got 401, waiting on session refresh");
        self.refresh_gate
            .run(epoch, || self.refresh_session())
            .await?;

        let retried = self.send(&request).await?;
        if retried.status == 401 {
            return Err(ClientError::Unauthorized);
        }
        into_result(retried)
    }

    /// Refresh the session now, joining any refresh already in flight.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let epoch = self.refresh_gate.epoch();
        self.refresh_gate
            .run(epoch, || self.refresh_session())
            .await
    }

    /// One call to the refresh endpoint. Never retried.
    async fn refresh_session(&self) -> Result<(), ClientError> {
        let body = serde_json::to_value(RefreshRequest::default())?;
        let request = ApiRequest::new(Method::Post, REFRESH_PATH).with_body(body);

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| ClientError::RefreshFailed {
                status: None,
                message: e.to_string(),
            })?;

        if !response.is_success() {
            let (_, message) = error_details(&response);
            return Err(ClientError::RefreshFailed {
                status: Some(response.status),
                message,
            });
        }

        let refreshed: RefreshResponse = decode(&response)?;
        self.set_access_token(Some(refreshed.access_token));
        Ok(())
    }

    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        match self.access_token() {
            Some(token) if request.header("authorization").is_none() => {
                let authed = request
                    .clone()
                    .with_header("Authorization", format!("Bearer {token}"));
                self.transport.send(&authed).await
            }
            _ => self.transport.send(request).await,
        }
    }
}

fn is_refreshable(endpoint: &str) -> bool {
    !NO_REFRESH_SUFFIXES
        .iter()
        .any(|suffix| endpoint.ends_with(suffix))
}

fn into_result(response: ApiResponse) -> Result<ApiResponse, ClientError> {
    if response.is_success() {
        return Ok(response);
    }
    let (code, message) = error_details(&response);
    Err(ClientError::Api {
        status: response.status,
        code,
        message,
    })
}

/// Pull a code and message out of an error body.
///
/// Message preference: `message`, then `error`, then the code, then `HTTP <status>`.
fn error_details(response: &ApiResponse) -> (Option<ErrorCode>, String) {
    let body: serde_json::Value =
        serde_json::from_slice(&response.body).unwrap_or(serde_json::Value::Null);

    let code = body
        .get("code")
        .and_then(|c| serde_json::from_value::<ErrorCode>(c.clone()).ok());

    let message = ["message", "error", "code"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", response.status));

    (code, message)
}

/// Decode a JSON body; an empty body decodes as `null` so `()` works for 204s.
pub(crate) fn decode<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, ClientError> {
    let bytes: &[u8] = if response.body.is_empty() {
        b"null"
    } else {
        &response.body
    };
    serde_json::from_slice(bytes).map_err(ClientError::from)
}
