use std::collections::HashMap;

use async_trait::async_trait;

use crate::app_error::AppResult;

/// What we ask the gateway to collect.
#[derive(Debug, Clone)]
pub struct GatewayOrderRequest {
    pub amount_paise: i64,
    pub currency: String,
    /// Our reference, echoed back by the gateway (max 40 chars)
    pub receipt: String,
    pub notes: HashMap<String, String>,
}

/// An order as created on the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount_paise: i64,
    pub currency: String,
}

/// Checkout order creation. Signature verification happens locally with the
/// key secret and is not part of this port.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key handed to the browser checkout.
    fn key_id(&self) -> &str;

    async fn create_order(&self, request: &GatewayOrderRequest) -> AppResult<GatewayOrder>;
}
