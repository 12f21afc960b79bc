//! Rust client for the Verdant subscription API.
//!
//! # Features
//!
//! - **Single-flight refresh** - concurrent 401s share one `/auth/refresh-token` call
//! - **One retry** - a request is retried at most once after a refresh
//! - **Typed endpoints** - auth, plans, payments, subscriptions and admin
//! - **Explicit session** - [`Session`] holds the signed-in user
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use verdant_sdk::{ApiClient, ClientConfig, Session};
//!
//! let client = Arc::new(ApiClient::connect(&ClientConfig::new("http://localhost:3001/api/v1"))?);
//! let session = Session::new(client.clone());
//! session.login("asha@example.com", "correct horse").await?;
//!
//! let status = client.my_subscription_status().await?;
//! println!("days remaining: {}", status.days_remaining);
//! ```

mod client;
mod endpoints;
mod error;
mod refresh;
mod session;
mod transport;

#[cfg(test)]
mod test_support;

pub use client::ApiClient;
pub use error::ClientError;
pub use refresh::RefreshGate;
pub use session::Session;
#[cfg(feature = "client")]
pub use transport::ReqwestTransport;
pub use transport::{ApiRequest, ApiResponse, ClientConfig, Method, Transport};

// Re-export shared types for convenience
pub use verdant_types::{
    ErrorCode, PlanDetails, Role, SubscriptionAction, SubscriptionDetails, SubscriptionStatus,
    SubscriptionStatusResponse, UserDetails,
};
