use chrono::{DateTime, Utc};
use uuid::Uuid;
use verdant_types::{OrderPurpose, OrderStatus};

/// One Razorpay order, tied to the subscription it pays for.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOrder {
    pub id: Uuid,
    pub razorpay_order_id: String,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub subscription_id: Uuid,
    pub purpose: OrderPurpose,
    pub amount_paise: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub razorpay_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}
