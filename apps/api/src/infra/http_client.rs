//! Outbound HTTP client with consistent timeouts.
//!
//! Gateway clients build their `reqwest::Client` here rather than with
//! `Client::new()`, which has no request timeout.

use std::time::Duration;

use reqwest::Client;

use super::InfraError;

/// TCP handshake + TLS.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request/response time. Order creation is expected to answer in
/// well under a second.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn build_client() -> Result<Client, InfraError> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(InfraError::HttpClient)
}
