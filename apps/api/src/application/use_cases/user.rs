use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;
use verdant_types::Role;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        password::{hash_password, verify_password},
        validators::{MAX_NAME_LEN, clean_text, is_valid_email, normalize_email, validate_password},
    },
    domain::entities::user::User,
};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create(&self, user: &User) -> AppResult<()>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;
}

#[derive(Clone)]
pub struct AuthUseCases {
    repo: Arc<dyn UserRepo>,
    /// Lowercased addresses that register as admins.
    admin_emails: Vec<String>,
}

impl AuthUseCases {
    pub fn new(repo: Arc<dyn UserRepo>, admin_emails: Vec<String>) -> Self {
        let admin_emails = admin_emails.iter().map(|e| normalize_email(e)).collect();
        Self { repo, admin_emails }
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, name: &str, email: &str, password: &str) -> AppResult<User> {
        let name = clean_text(name, "Name", MAX_NAME_LEN).map_err(AppError::InvalidInput)?;
        if !is_valid_email(email) {
            return Err(AppError::InvalidInput("Invalid email address".into()));
        }
        validate_password(password).map_err(AppError::InvalidInput)?;

        let email = normalize_email(email);
        if self.repo.get_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "An account with this email already exists".into(),
            ));
        }

        let role = if self.admin_emails.contains(&email) {
            Role::Admin
        } else {
            Role::User
        };
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash: hash_password(password)?,
            role,
            created_at: now,
            updated_at: now,
        };
        self.repo.create(&user).await?;

        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<User> {
        let email = normalize_email(email);
        let Some(user) = self.repo.get_by_email(&email).await? else {
            return Err(AppError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<User> {
        self.repo
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}
