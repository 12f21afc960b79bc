use std::sync::Arc;

use crate::{
    application::use_cases::{
        payments::PaymentUseCases, plans::PlanUseCases, subscriptions::SubscriptionUseCases,
        user::AuthUseCases,
    },
    infra::{RateLimiterTrait, config::AppConfig},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth_use_cases: Arc<AuthUseCases>,
    pub plan_use_cases: Arc<PlanUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub payment_use_cases: Arc<PaymentUseCases>,
    pub rate_limiter: Arc<dyn RateLimiterTrait>,
}
