use crate::{
    adapters::http::app_state::AppState,
    application::ports::payment_gateway::PaymentGateway,
    infra::{
        config::AppConfig,
        dummy_payment_gateway::DummyPaymentGateway,
        postgres_persistence,
        rate_limit::{RateLimits, RedisRateLimiter},
        razorpay_client::RazorpayGateway,
    },
    use_cases::{
        payments::{PaymentOrderRepo, PaymentUseCases},
        plans::{PlanRepo, PlanUseCases},
        subscriptions::{SubscriptionEventRepo, SubscriptionRepo, SubscriptionUseCases},
        user::{AuthUseCases, UserRepo},
    },
};
use secrecy::{ExposeSecret, SecretString};
use std::fs::File;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let rate_limiter = Arc::new(
        RedisRateLimiter::new(
            &config.redis_url,
            RateLimits {
                window_secs: config.rate_limit_window_secs,
                per_ip: config.rate_limit_per_ip,
                per_email: config.rate_limit_per_email,
            },
        )
        .await?,
    );

    let gateway: Arc<dyn PaymentGateway> = match &config.razorpay_key_id {
        Some(key_id) => Arc::new(RazorpayGateway::new(
            key_id.clone(),
            SecretString::new(config.razorpay_key_secret.expose_secret().into()),
        )?),
        None => {
            warn!("RAZORPAY_KEY_ID not set, using the dummy payment gateway");
            Arc::new(DummyPaymentGateway::new())
        }
    };

    let user_repo_arc = postgres_arc.clone() as Arc<dyn UserRepo>;
    let plan_repo_arc = postgres_arc.clone() as Arc<dyn PlanRepo>;
    let sub_repo_arc = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let event_repo_arc = postgres_arc.clone() as Arc<dyn SubscriptionEventRepo>;
    let order_repo_arc = postgres_arc.clone() as Arc<dyn PaymentOrderRepo>;

    let auth_use_cases = AuthUseCases::new(user_repo_arc.clone(), config.admin_emails.clone());
    let plan_use_cases = PlanUseCases::new(plan_repo_arc.clone());
    let subscription_use_cases = SubscriptionUseCases::new(
        sub_repo_arc.clone(),
        event_repo_arc.clone(),
        plan_repo_arc.clone(),
        user_repo_arc,
        config.lifecycle,
    );
    let payment_use_cases = PaymentUseCases::new(
        order_repo_arc,
        sub_repo_arc,
        event_repo_arc,
        plan_repo_arc,
        gateway,
        SecretString::new(config.razorpay_key_secret.expose_secret().into()),
        config.lifecycle,
    );

    info!(
        grace_period_days = config.lifecycle.grace_period_days,
        renewal_window_days = config.lifecycle.renewal_window_days,
        "Application state initialized"
    );

    Ok(AppState {
        config: Arc::new(config),
        auth_use_cases: Arc::new(auth_use_cases),
        plan_use_cases: Arc::new(plan_use_cases),
        subscription_use_cases: Arc::new(subscription_use_cases),
        payment_use_cases: Arc::new(payment_use_cases),
        rate_limiter,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "verdant_api=debug,tower_http=debug".into());

    let console_layer = fmt::layer().with_target(false).with_level(true).pretty();

    // JSON copy for log shipping; skipped when app.log can't be opened
    let json_layer = File::create("app.log").ok().map(|file| {
        fmt::layer()
            .json()
            .with_writer(file)
            .with_current_span(true)
            .with_span_list(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
