//! Razorpay Orders API client.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::{InfraError, http_client::build_client};
use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{GatewayOrder, GatewayOrderRequest, PaymentGateway},
};

const RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";

pub struct RazorpayGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    notes: &'a std::collections::HashMap<String, String>,
}

#[derive(Deserialize)]
struct RazorpayOrder {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Deserialize)]
struct RazorpayErrorResponse {
    error: RazorpayErrorBody,
}

#[derive(Deserialize)]
struct RazorpayErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RazorpayGateway {
    pub fn new(key_id: String, key_secret: SecretString) -> Result<Self, InfraError> {
        Self::with_base_url(RAZORPAY_API_BASE.to_string(), key_id, key_secret)
    }

    pub fn with_base_url(
        base_url: String,
        key_id: String,
        key_secret: SecretString,
    ) -> Result<Self, InfraError> {
        Ok(Self {
            client: build_client()?,
            base_url,
            key_id,
            key_secret,
        })
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.key_id,
            self.key_secret.expose_secret()
        ));
        format!("Basic {}", encoded)
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Razorpay API error");

            if let Ok(error) = serde_json::from_str::<RazorpayErrorResponse>(&body) {
                let detail = error
                    .error
                    .description
                    .or(error.error.code)
                    .unwrap_or_else(|| status.to_string());
                return Err(AppError::Gateway(format!("Razorpay error: {}", detail)));
            }

            return Err(AppError::Gateway(format!("Razorpay API error: {}", status)));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse Razorpay response");
            AppError::Gateway(format!("Failed to parse Razorpay response: {}", e))
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, request: &GatewayOrderRequest) -> AppResult<GatewayOrder> {
        let body = CreateOrderBody {
            amount: request.amount_paise,
            currency: &request.currency,
            receipt: &request.receipt,
            notes: &request.notes,
        };

        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Razorpay request failed: {}", e)))?;

        let order: RazorpayOrder = self.handle_response(response).await?;
        tracing::info!(order_id = %order.id, amount = order.amount, "Razorpay order created");

        Ok(GatewayOrder {
            id: order.id,
            amount_paise: order.amount,
            currency: order.currency,
        })
    }
}
