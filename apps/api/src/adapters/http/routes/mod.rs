pub mod admin_plans;
pub mod admin_subscriptions;
pub mod auth;
pub mod common;
pub mod payments;
pub mod plans;
pub mod subscriptions;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/plans", plans::router())
        .nest("/payments", payments::router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/admin/plans", admin_plans::router())
        .nest("/admin/subscriptions", admin_subscriptions::router())
}
