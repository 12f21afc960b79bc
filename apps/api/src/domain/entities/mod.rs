pub mod payment_order;
pub mod plan;
pub mod subscription;
pub mod subscription_event;
pub mod user;
