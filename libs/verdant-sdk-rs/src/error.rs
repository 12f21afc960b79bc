use thiserror::Error;
use verdant_types::ErrorCode;

/// SDK errors.
///
/// `Clone` so one refresh outcome can be handed to every queued caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// Transport failure (DNS, TLS, timeout, connection reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from the API
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<ErrorCode>,
        message: String,
    },

    /// Still unauthorized after a successful refresh
    #[error("Unauthorized")]
    Unauthorized,

    /// The shared token refresh failed; every waiting request gets this
    #[error("Session refresh failed: {message}")]
    RefreshFailed {
        status: Option<u16>,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Unauthorized => Some(401),
            ClientError::RefreshFailed { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(feature = "client")]
impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}
