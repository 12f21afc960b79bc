use async_trait::async_trait;
use redis::{Script, aio::ConnectionManager};

use super::InfraError;
use crate::app_error::{AppError, AppResult};

/// Fixed-window request limiting per client IP and per signed-in email.
#[async_trait]
pub trait RateLimiterTrait: Send + Sync {
    /// `Err(AppError::RateLimited)` once either budget is spent for the window.
    async fn check(&self, ip: &str, email: Option<&str>) -> AppResult<()>;
}

/// Increment and return the counter, starting the window on first hit.
/// Also repairs a key that somehow lost its TTL.
const INCR_WITH_TTL_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 or redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

const KEY_PREFIX: &str = "verdant:rate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub window_secs: u64,
    pub per_ip: u64,
    pub per_email: u64,
}

pub(crate) fn ip_key(ip: &str) -> String {
    format!("{KEY_PREFIX}:ip:{ip}")
}

pub(crate) fn email_key(email: &str) -> String {
    format!("{KEY_PREFIX}:email:{}", email.trim().to_lowercase())
}

/// Redis-backed limiter shared by every API instance.
#[derive(Clone)]
pub struct RedisRateLimiter {
    manager: ConnectionManager,
    limits: RateLimits,
    script: Script,
}

impl RedisRateLimiter {
    pub async fn new(redis_url: &str, limits: RateLimits) -> Result<Self, InfraError> {
        let client = redis::Client::open(redis_url).map_err(InfraError::RedisConnection)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(InfraError::RedisConnection)?;
        Ok(Self {
            manager,
            limits,
            script: Script::new(INCR_WITH_TTL_SCRIPT),
        })
    }

    async fn bump(&self, conn: &mut ConnectionManager, key: &str, limit: u64) -> AppResult<()> {
        let current: u64 = self
            .script
            .key(key)
            .arg(self.limits.window_secs)
            .invoke_async(conn)
            .await
            .map_err(|e| AppError::Internal(format!("Rate limiter unavailable: {e}")))?;

        if current > limit {
            tracing::warn!(key = %key, current, limit, "Rate limit exceeded");
            return Err(AppError::RateLimited);
        }
        Ok(())
    }
}

#[async_trait]
impl RateLimiterTrait for RedisRateLimiter {
    async fn check(&self, ip: &str, email: Option<&str>) -> AppResult<()> {
        let mut conn = self.manager.clone();
        self.bump(&mut conn, &ip_key(ip), self.limits.per_ip).await?;
        if let Some(email) = email {
            self.bump(&mut conn, &email_key(email), self.limits.per_email)
                .await?;
        }
        Ok(())
    }
}
