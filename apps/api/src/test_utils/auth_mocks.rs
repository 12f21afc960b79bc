//! In-memory user repository and rate limiter.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::user::UserRepo,
    domain::entities::user::User,
};

#[derive(Default)]
pub struct InMemoryUserRepo {
    pub users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users: Mutex::new(users.into_iter().map(|u| (u.id, u)).collect()),
        }
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn create(&self, user: &User) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }
}

/// In-memory rate limiter with fixed budgets and no window expiry.
pub struct InMemoryRateLimiter {
    counts: Mutex<HashMap<String, u64>>,
    max_per_ip: u64,
    max_per_email: u64,
}

impl InMemoryRateLimiter {
    pub fn new(max_per_ip: u64, max_per_email: u64) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            max_per_ip,
            max_per_email,
        }
    }

    /// Create a permissive rate limiter that never blocks (for most tests).
    pub fn permissive() -> Self {
        Self::new(u64::MAX, u64::MAX)
    }
}

#[async_trait]
impl crate::infra::RateLimiterTrait for InMemoryRateLimiter {
    async fn check(&self, ip: &str, email: Option<&str>) -> AppResult<()> {
        let mut counts = self.counts.lock().unwrap();

        let ip_count = counts.entry(format!("ip:{ip}")).or_insert(0);
        *ip_count += 1;
        if *ip_count > self.max_per_ip {
            return Err(AppError::RateLimited);
        }

        if let Some(email) = email {
            let email_count = counts
                .entry(format!("email:{}", email.to_lowercase()))
                .or_insert(0);
            *email_count += 1;
            if *email_count > self.max_per_email {
                return Err(AppError::RateLimited);
            }
        }
        Ok(())
    }
}
