//! Shared types for Verdant subscriptions.
//!
//! This crate provides:
//! - The subscription status state machine and action gating
//! - Payment method and gateway order enums
//! - Wire request/response types (camelCase JSON)
//! - Razorpay checkout signature primitives

mod errors;
mod payment;
mod requests;
mod responses;
mod signature;
mod subscription;

pub use errors::{ApiErrorBody, ErrorCode};
pub use payment::{OrderPurpose, OrderStatus, PaymentMethod};
pub use requests::{
    AddNoteRequest, CancelSubscriptionRequest, ChangePlanRequest, CreateOrderRequest,
    CreatePlanRequest, EditSubscriptionRequest, ExtendSubscriptionRequest, LoginRequest,
    OfflineSubscriptionRequest, RefreshRequest, RegisterRequest, RenewSubscriptionRequest,
    SubscriptionListQuery, UpdatePlanRequest, VerifyPaymentRequest,
};
pub use responses::{
    AdminSubscriptionListItem, AdminSubscriptionView, AuthResponse, CurrentUserResponse,
    OrderResponse, PaginatedSubscriptions, PlanDetails, RefreshResponse, Role,
    SubscriptionDetails, SubscriptionEventDetails, SubscriptionNote, SubscriptionStatusResponse,
    UserDetails, VerifyPaymentResponse,
};
pub use signature::{SignatureError, sign_payment, verify_payment_signature};
pub use subscription::{
    DEFAULT_GRACE_PERIOD_DAYS, DEFAULT_RENEWAL_WINDOW_DAYS, SubscriptionAction,
    SubscriptionStatus, days_remaining,
};
