use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::ports::payment_gateway::{GatewayOrder, GatewayOrderRequest, PaymentGateway},
};

pub const DUMMY_KEY_ID: &str = "rzp_test_dummy";

/// Local gateway for development and tests.
///
/// Orders are created in memory without any network call. Payments are
/// "completed" by signing a made-up payment id with the configured key
/// secret, see `verdant_types::sign_payment`.
#[derive(Debug, Clone, Default)]
pub struct DummyPaymentGateway;

impl DummyPaymentGateway {
    pub fn new() -> Self {
        Self
    }

    /// A payment id that looks like a gateway one.
    pub fn synthetic_payment_id() -> String {
        format!("pay_dummy_{}", Uuid::new_v4().simple())
    }
}

#[async_trait]
impl PaymentGateway for DummyPaymentGateway {
    fn key_id(&self) -> &str {
        DUMMY_KEY_ID
    }

    async fn create_order(&self, request: &GatewayOrderRequest) -> AppResult<GatewayOrder> {
        let id = format!("order_dummy_{}", Uuid::new_v4().simple());
        tracing::debug!(order_id = %id, receipt = %request.receipt, "Dummy order created");
        Ok(GatewayOrder {
            id,
            amount_paise: request.amount_paise,
            currency: request.currency.clone(),
        })
    }
}
