//! Test app state builder for HTTP-level integration testing.
//!
//! This module provides `TestAppStateBuilder` which creates a minimal `AppState`
//! with in-memory mocks for testing HTTP endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::http::HeaderValue;
use secrecy::SecretString;
use time::Duration;

use crate::{
    adapters::http::app_state::AppState,
    application::{
        jwt::{self, TokenKind},
        ports::payment_gateway::PaymentGateway,
        use_cases::{
            payments::PaymentUseCases,
            plans::PlanUseCases,
            subscriptions::{LifecyclePolicy, SubscriptionUseCases},
            user::AuthUseCases,
        },
    },
    domain::entities::{plan::Plan, subscription::Subscription, user::User},
    infra::{
        RateLimiterTrait, config::AppConfig, dummy_payment_gateway::DummyPaymentGateway,
    },
    test_utils::{
        InMemoryPaymentOrderRepo, InMemoryPlanRepo, InMemoryRateLimiter,
        InMemorySubscriptionEventRepo, InMemorySubscriptionRepo, InMemoryUserRepo,
    },
};

pub const TEST_JWT_SECRET: &str = "test_jwt_secret";
pub const TEST_RAZORPAY_SECRET: &str = "test_razorpay_secret";

/// Access token for `user`, valid for an hour.
pub fn access_token_for(user: &User) -> String {
    jwt::issue(
        user.id,
        user.role,
        TokenKind::Access,
        &SecretString::new(TEST_JWT_SECRET.into()),
        Duration::hours(1),
    )
    .unwrap()
}

/// Handles on the in-memory repos behind a built `AppState`.
pub struct TestRepos {
    pub users: Arc<InMemoryUserRepo>,
    pub plans: Arc<InMemoryPlanRepo>,
    pub subscriptions: Arc<InMemorySubscriptionRepo>,
    pub events: Arc<InMemorySubscriptionEventRepo>,
    pub orders: Arc<InMemoryPaymentOrderRepo>,
}

/// Builder for creating `AppState` with in-memory mocks for testing.
///
/// # Example
///
/// ```ignore
/// let plan = create_test_plan(|p| p.duration_days = 30);
/// let user = create_test_user(|_| {});
///
/// let app_state = TestAppStateBuilder::new()
///     .with_plan(plan)
///     .with_user(user)
///     .build();
/// ```
pub struct TestAppStateBuilder {
    users: Vec<User>,
    plans: Vec<Plan>,
    subscriptions: Vec<Subscription>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    rate_limiter: Option<Arc<dyn RateLimiterTrait>>,
    admin_emails: Vec<String>,
    policy: LifecyclePolicy,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            users: vec![],
            plans: vec![],
            subscriptions: vec![],
            gateway: None,
            rate_limiter: None,
            admin_emails: vec![],
            policy: LifecyclePolicy::default(),
        }
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plans.push(plan);
        self
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    /// Defaults to the dummy gateway.
    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiterTrait>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn with_admin_email(mut self, email: &str) -> Self {
        self.admin_emails.push(email.to_lowercase());
        self
    }

    pub fn with_policy(mut self, policy: LifecyclePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the AppState with all configured mocks.
    pub fn build(self) -> AppState {
        self.build_with_repos().0
    }

    /// Build the AppState and keep handles on the repos for assertions.
    pub fn build_with_repos(self) -> (AppState, TestRepos) {
        let users = Arc::new(InMemoryUserRepo::with_users(self.users));
        let plans = Arc::new(InMemoryPlanRepo::with_plans(self.plans));
        let subscriptions = Arc::new(
            InMemorySubscriptionRepo::with_subscriptions(self.subscriptions)
                .with_directory(plans.clone(), users.clone()),
        );
        let events = Arc::new(InMemorySubscriptionEventRepo::new());
        let orders = Arc::new(InMemoryPaymentOrderRepo::new());
        let gateway = self
            .gateway
            .unwrap_or_else(|| Arc::new(DummyPaymentGateway::new()));

        let auth_use_cases = Arc::new(AuthUseCases::new(users.clone(), self.admin_emails.clone()));
        let plan_use_cases = Arc::new(PlanUseCases::new(plans.clone()));
        let subscription_use_cases = Arc::new(SubscriptionUseCases::new(
            subscriptions.clone(),
            events.clone(),
            plans.clone(),
            users.clone(),
            self.policy,
        ));
        let payment_use_cases = Arc::new(PaymentUseCases::new(
            orders.clone(),
            subscriptions.clone(),
            events.clone(),
            plans.clone(),
            gateway,
            SecretString::new(TEST_RAZORPAY_SECRET.into()),
            self.policy,
        ));

        // Create minimal config for testing
        let config = Arc::new(AppConfig {
            database_url: String::new(),
            jwt_secret: SecretString::new(TEST_JWT_SECRET.into()),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(30),
            bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            redis_url: String::new(),
            rate_limit_window_secs: 60,
            rate_limit_per_ip: 60,
            rate_limit_per_email: 30,
            trust_proxy: false,
            cookie_secure: false,
            razorpay_key_id: None,
            razorpay_key_secret: SecretString::new(TEST_RAZORPAY_SECRET.into()),
            lifecycle: self.policy,
            lifecycle_sweep_interval: StdDuration::from_secs(300),
            admin_emails: self.admin_emails,
        });

        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(InMemoryRateLimiter::permissive()));

        let app_state = AppState {
            config,
            auth_use_cases,
            plan_use_cases,
            subscription_use_cases,
            payment_use_cases,
            rate_limiter,
        };
        let repos = TestRepos {
            users,
            plans,
            subscriptions,
            events,
            orders,
        };
        (app_state, repos)
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
