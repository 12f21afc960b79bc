//! Scripted in-memory transport for client tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Barrier;

use crate::client::{LOGIN_PATH, REFRESH_PATH};
use crate::error::ClientError;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Fake API server.
///
/// Requests carrying the stale bearer token wait until `expected_stale`
/// of them have arrived, then all get 401 together. Requests carrying the
/// refreshed token succeed unless `reject_fresh` is set.
pub struct ScriptedTransport {
    stale_barrier: Barrier,
    refresh_result: Result<String, u16>,
    reject_fresh: bool,
    pub refresh_calls: AtomicUsize,
    pub retried_calls: AtomicUsize,
    pub seen: Mutex<Vec<ApiRequest>>,
    responses: Mutex<Vec<(String, u16, Value)>>,
}

impl ScriptedTransport {
    pub fn new(expected_stale: usize) -> Self {
        Self {
            stale_barrier: Barrier::new(expected_stale),
            refresh_result: Err(500),
            reject_fresh: false,
            refresh_calls: AtomicUsize::new(0),
            retried_calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
        }
    }

    pub fn refresh_ok(mut self, token: &str) -> Self {
        self.refresh_result = Ok(token.to_string());
        self
    }

    pub fn refresh_fails(mut self, status: u16) -> Self {
        self.refresh_result = Err(status);
        self
    }

    pub fn reject_fresh_token(mut self) -> Self {
        self.reject_fresh = true;
        self
    }

    /// Canned response for an endpoint, checked before the token rules.
    pub fn respond(self, endpoint: &str, status: u16, body: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((endpoint.to_string(), status, body));
        self
    }

    pub fn requests_to(&self, endpoint: &str) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.endpoint() == endpoint)
            .count()
    }

    fn reply(status: u16, body: Value) -> Result<ApiResponse, ClientError> {
        Ok(ApiResponse {
            status,
            body: serde_json::to_vec(&body).unwrap(),
        })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        self.seen.lock().unwrap().push(request.clone());

        let canned = self
            .responses
            .lock()
            .unwrap()
            .iter()
            .find(|(endpoint, _, _)| endpoint == request.endpoint())
            .map(|(_, status, body)| (*status, body.clone()));
        if let Some((status, body)) = canned {
            return Self::reply(status, body);
        }

        match request.endpoint() {
            REFRESH_PATH => {
                self.refresh_calls.fetch_add(1, Ordering::SeqCst);
                match &self.refresh_result {
                    Ok(token) => Self::reply(200, json!({ "accessToken": token })),
                    Err(status) => Self::reply(
                        *status,
                        json!({ "code": "UNAUTHORIZED", "message": "Refresh token expired" }),
                    ),
                }
            }
            LOGIN_PATH => Self::reply(
                401,
                json!({ "code": "INVALID_CREDENTIALS", "message": "Invalid email or password" }),
            ),
            _ => match request.header("authorization") {
                Some("Bearer stale") => {
                    self.stale_barrier.wait().await;
                    Self::reply(401, json!({ "code": "UNAUTHORIZED" }))
                }
                Some(_) => {
                    self.retried_calls.fetch_add(1, Ordering::SeqCst);
                    if self.reject_fresh {
                        Self::reply(401, json!({ "code": "UNAUTHORIZED" }))
                    } else {
                        Self::reply(200, json!({ "ok": true }))
                    }
                }
                None => Self::reply(401, json!({ "code": "UNAUTHORIZED" })),
            },
        }
    }
}
