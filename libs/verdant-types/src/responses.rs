use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::payment::{OrderPurpose, PaymentMethod};
use crate::subscription::{SubscriptionAction, SubscriptionStatus};

/// Account role. Admins manage plans and other users' subscriptions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "user_role", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}

/// Returned by register and login.
///
/// The session cookies are set as well; `access_token` is repeated in the
/// body for callers that prefer bearer auth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserDetails,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUserResponse {
    pub user: UserDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDetails {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Price in paise
    pub price_paise: i64,
    pub currency: String,
    pub duration_days: i32,
    pub features: Vec<String>,
    pub is_active: bool,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionNote {
    pub text: String,
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetails {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub plan_name: Option<String>,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub renewal_count: i32,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub notes: Vec<SubscriptionNote>,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub days_remaining: i64,
    pub allowed_actions: Vec<SubscriptionAction>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Compact entitlement view for the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusResponse {
    pub has_subscription: bool,
    pub status: Option<SubscriptionStatus>,
    pub plan_name: Option<String>,
    pub days_remaining: i64,
    pub end_date: Option<DateTime<Utc>>,
    pub allowed_actions: Vec<SubscriptionAction>,
}

impl SubscriptionStatusResponse {
    pub fn none() -> Self {
        Self {
            has_subscription: false,
            status: None,
            plan_name: None,
            days_remaining: 0,
            end_date: None,
            allowed_actions: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEventDetails {
    pub id: Uuid,
    pub event_type: String,
    pub previous_status: Option<SubscriptionStatus>,
    pub new_status: Option<SubscriptionStatus>,
    pub metadata: serde_json::Value,
    pub created_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSubscriptionView {
    pub subscription: SubscriptionDetails,
    pub user_email: String,
    pub events: Vec<SubscriptionEventDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSubscriptionListItem {
    pub subscription: SubscriptionDetails,
    pub user_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedSubscriptions {
    pub items: Vec<AdminSubscriptionListItem>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Everything the browser needs to open Razorpay checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: String,
    /// Amount in paise
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
    pub subscription_id: Uuid,
    pub purpose: OrderPurpose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub subscription: SubscriptionDetails,
}
