//! Explicit authentication state for one signed-in user.

use std::sync::{Arc, PoisonError, RwLock};

use verdant_types::{AuthResponse, LoginRequest, RegisterRequest, Role, UserDetails};

use crate::client::ApiClient;
use crate::error::ClientError;

/// Holds the current user next to the client that carries their session.
///
/// Pass it to whatever needs auth state instead of reaching for a global.
pub struct Session {
    client: Arc<ApiClient>,
    user: RwLock<Option<UserDetails>>,
}

impl Session {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            user: RwLock::new(None),
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Cached user, without a network call.
    pub fn user(&self) -> Option<UserDetails> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|u| u.role == Role::Admin)
    }

    fn set_user(&self, user: Option<UserDetails>) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }

    pub async fn login(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<UserDetails, ClientError> {
        let AuthResponse { user, .. } = self
            .client
            .login(&LoginRequest {
                email: email.into(),
                password: password.into(),
            })
            .await?;
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<UserDetails, ClientError> {
        let AuthResponse { user, .. } = self.client.register(request).await?;
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Ends the session locally even when the server call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.client.logout().await;
        self.set_user(None);
        result
    }

    /// Re-fetch the current user.
    ///
    /// # Returns
    /// `Ok(None)` when the session is gone (refresh failed or still 401),
    /// in which case the cached user is cleared too.
    pub async fn current_user(&self) -> Result<Option<UserDetails>, ClientError> {
        match self.client.me().await {
            Ok(resp) => {
                self.set_user(Some(resp.user.clone()));
                Ok(Some(resp.user))
            }
            Err(ClientError::Unauthorized | ClientError::RefreshFailed { .. }) => {
                self.set_user(None);
                self.client.set_access_token(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Force a token refresh, joining any refresh already in flight.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let result = self.client.refresh().await;
        if result.is_err() {
            self.set_user(None);
        }
        result
    }
}
