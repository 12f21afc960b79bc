use std::{net::SocketAddr, time::Duration as StdDuration};

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use time::Duration;

use super::InfraError;
use crate::application::use_cases::subscriptions::LifecyclePolicy;

pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: SecretString,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    pub redis_url: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_per_ip: u64,
    pub rate_limit_per_email: u64,
    /// Trust X-Forwarded-For / X-Real-IP. Only enable behind a reverse proxy.
    pub trust_proxy: bool,
    /// Mark auth cookies `Secure`. Required when served over HTTPS.
    pub cookie_secure: bool,
    /// Unset means the local dummy gateway is used.
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: SecretString,
    pub lifecycle: LifecyclePolicy,
    pub lifecycle_sweep_interval: StdDuration,
    /// Lowercased emails that register as admins.
    pub admin_emails: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let database_url: String = required("DATABASE_URL")?;
        let jwt_secret = SecretString::new(required("JWT_SECRET")?.into());
        let razorpay_key_secret = SecretString::new(required("RAZORPAY_KEY_SECRET")?.into());

        let access_token_ttl_secs: i64 = get_env_default("ACCESS_TOKEN_TTL_SECS", 900);
        let refresh_token_ttl_days: i64 = get_env_default("REFRESH_TOKEN_TTL_DAYS", 30);

        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", String::from("127.0.0.1:3001"))
            .parse()
            .map_err(|_| InfraError::ConfigInvalid { var: "BIND_ADDR" })?;
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .map_err(|_| InfraError::ConfigInvalid { var: "CORS_ORIGIN" })?;

        let redis_url: String = get_env_default("REDIS_URL", "redis://127.0.0.1:6379".to_string());
        let rate_limit_window_secs: u64 = get_env_default("RATE_LIMIT_WINDOW_SECS", 60);
        let rate_limit_per_ip: u64 = get_env_default("RATE_LIMIT_PER_IP", 120);
        let rate_limit_per_email: u64 = get_env_default("RATE_LIMIT_PER_EMAIL", 30);
        // Off unless explicitly enabled behind a trusted proxy
        let trust_proxy: bool = get_env_default("TRUST_PROXY", false);
        let cookie_secure: bool = get_env_default("COOKIE_SECURE", false);

        let razorpay_key_id = std::env::var("RAZORPAY_KEY_ID")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let grace_period_days: i64 = get_env_default("GRACE_PERIOD_DAYS", 7);
        let renewal_window_days: i64 = get_env_default("RENEWAL_WINDOW_DAYS", 7);
        if grace_period_days < 0 {
            return Err(InfraError::ConfigInvalid { var: "GRACE_PERIOD_DAYS" });
        }
        if renewal_window_days < 0 {
            return Err(InfraError::ConfigInvalid { var: "RENEWAL_WINDOW_DAYS" });
        }
        let sweep_secs: u64 = get_env_default("LIFECYCLE_SWEEP_SECS", 300);
        if sweep_secs == 0 {
            return Err(InfraError::ConfigInvalid { var: "LIFECYCLE_SWEEP_SECS" });
        }

        let admin_emails = parse_email_list(&get_env_default("ADMIN_EMAILS", String::new()));

        Ok(Self {
            database_url,
            jwt_secret,
            access_token_ttl: Duration::seconds(access_token_ttl_secs),
            refresh_token_ttl: Duration::days(refresh_token_ttl_days),
            bind_addr,
            cors_origin,
            redis_url,
            rate_limit_window_secs,
            rate_limit_per_ip,
            rate_limit_per_email,
            trust_proxy,
            cookie_secure,
            razorpay_key_id,
            razorpay_key_secret,
            lifecycle: LifecyclePolicy {
                grace_period_days,
                renewal_window_days,
            },
            lifecycle_sweep_interval: StdDuration::from_secs(sweep_secs),
            admin_emails,
        })
    }
}

fn required(var: &'static str) -> Result<String, InfraError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(get_env(var)),
        _ => Err(InfraError::ConfigMissing { var }),
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
