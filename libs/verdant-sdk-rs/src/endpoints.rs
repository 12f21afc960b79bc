//! Typed wrappers over the REST endpoints.

use uuid::Uuid;
use verdant_types::{
    AddNoteRequest, AdminSubscriptionView, AuthResponse, CancelSubscriptionRequest,
    ChangePlanRequest, CreateOrderRequest, CreatePlanRequest, CurrentUserResponse,
    EditSubscriptionRequest, ExtendSubscriptionRequest, LoginRequest, OfflineSubscriptionRequest,
    OrderResponse, PaginatedSubscriptions, PlanDetails, RegisterRequest, RenewSubscriptionRequest,
    SubscriptionDetails, SubscriptionListQuery, SubscriptionStatusResponse, UpdatePlanRequest,
    VerifyPaymentRequest, VerifyPaymentResponse,
};

use crate::client::{ApiClient, LOGIN_PATH};
use crate::error::ClientError;

// Auth
impl ApiClient {
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        let auth: AuthResponse = self.post("/auth/register", request).await?;
        self.set_access_token(Some(auth.access_token.clone()));
        Ok(auth)
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let auth: AuthResponse = self.post(LOGIN_PATH, request).await?;
        self.set_access_token(Some(auth.access_token.clone()));
        Ok(auth)
    }

    /// Revoke the session server-side. The local token is dropped regardless.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self
            .post::<_, serde_json::Value>("/auth/logout", &serde_json::json!({}))
            .await
            .map(|_| ());
        self.set_access_token(None);
        result
    }

    pub async fn me(&self) -> Result<CurrentUserResponse, ClientError> {
        self.get("/auth/me").await
    }
}

// Plans
impl ApiClient {
    pub async fn list_plans(&self) -> Result<Vec<PlanDetails>, ClientError> {
        self.get("/plans").await
    }

    pub async fn get_plan(&self, id: Uuid) -> Result<PlanDetails, ClientError> {
        self.get(&format!("/plans/{id}")).await
    }

    pub async fn create_plan(&self, request: &CreatePlanRequest) -> Result<PlanDetails, ClientError> {
        self.post("/admin/plans", request).await
    }

    pub async fn update_plan(
        &self,
        id: Uuid,
        request: &UpdatePlanRequest,
    ) -> Result<PlanDetails, ClientError> {
        self.put(&format!("/admin/plans/{id}"), request).await
    }

    /// Plans are archived (`is_active = false`), never deleted.
    pub async fn archive_plan(&self, id: Uuid) -> Result<PlanDetails, ClientError> {
        self.delete(&format!("/admin/plans/{id}")).await
    }
}

// Payments
impl ApiClient {
    pub async fn create_order(&self, plan_id: Uuid) -> Result<OrderResponse, ClientError> {
        self.post("/payments/create-order", &CreateOrderRequest { plan_id })
            .await
    }

    pub async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ClientError> {
        self.post("/payments/verify", request).await
    }
}

// Own subscription
impl ApiClient {
    /// `None` when the user has never subscribed (the server answers 404).
    pub async fn my_subscription(&self) -> Result<Option<SubscriptionDetails>, ClientError> {
        match self.get("/subscriptions/me").await {
            Ok(subscription) => Ok(Some(subscription)),
            Err(ClientError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn my_subscription_status(&self) -> Result<SubscriptionStatusResponse, ClientError> {
        self.get("/subscriptions/me/status").await
    }

    pub async fn cancel_my_subscription(
        &self,
        reason: Option<String>,
    ) -> Result<SubscriptionDetails, ClientError> {
        self.post(
            "/subscriptions/me/cancel",
            &CancelSubscriptionRequest { reason },
        )
        .await
    }
}

// Admin subscriptions
impl ApiClient {
    pub async fn list_subscriptions(
        &self,
        query: &SubscriptionListQuery,
    ) -> Result<PaginatedSubscriptions, ClientError> {
        let mut params = Vec::new();
        if let Some(status) = query.status {
            params.push(format!("status={status}"));
        }
        if let Some(page) = query.page {
            params.push(format!("page={page}"));
        }
        if let Some(per_page) = query.per_page {
            params.push(format!("perPage={per_page}"));
        }
        let path = if params.is_empty() {
            "/admin/subscriptions".to_string()
        } else {
            format!("/admin/subscriptions?{}", params.join("&"))
        };
        self.get(&path).await
    }

    pub async fn get_subscription(&self, id: Uuid) -> Result<AdminSubscriptionView, ClientError> {
        self.get(&format!("/admin/subscriptions/{id}")).await
    }

    pub async fn create_offline_subscription(
        &self,
        request: &OfflineSubscriptionRequest,
    ) -> Result<SubscriptionDetails, ClientError> {
        self.post("/admin/subscriptions/offline", request).await
    }

    pub async fn extend_subscription(
        &self,
        id: Uuid,
        days: i64,
    ) -> Result<SubscriptionDetails, ClientError> {
        self.post(
            &format!("/admin/subscriptions/{id}/extend"),
            &ExtendSubscriptionRequest { days },
        )
        .await
    }

    pub async fn change_subscription_plan(
        &self,
        id: Uuid,
        plan_id: Uuid,
    ) -> Result<SubscriptionDetails, ClientError> {
        self.post(
            &format!("/admin/subscriptions/{id}/change-plan"),
            &ChangePlanRequest { plan_id },
        )
        .await
    }

    pub async fn cancel_subscription(
        &self,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<SubscriptionDetails, ClientError> {
        self.post(
            &format!("/admin/subscriptions/{id}/cancel"),
            &CancelSubscriptionRequest { reason },
        )
        .await
    }

    pub async fn renew_subscription(
        &self,
        id: Uuid,
        request: &RenewSubscriptionRequest,
    ) -> Result<SubscriptionDetails, ClientError> {
        self.post(&format!("/admin/subscriptions/{id}/renew"), request)
            .await
    }

    pub async fn add_subscription_note(
        &self,
        id: Uuid,
        text: impl Into<String>,
    ) -> Result<SubscriptionDetails, ClientError> {
        self.post(
            &format!("/admin/subscriptions/{id}/notes"),
            &AddNoteRequest { text: text.into() },
        )
        .await
    }

    pub async fn edit_subscription(
        &self,
        id: Uuid,
        request: &EditSubscriptionRequest,
    ) -> Result<SubscriptionDetails, ClientError> {
        self.put(&format!("/admin/subscriptions/{id}"), request)
            .await
    }
}
