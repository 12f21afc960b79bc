//! In-memory plan, subscription, event and order repositories, plus gateway stubs.

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use verdant_types::{OrderStatus, SubscriptionNote, SubscriptionStatus};

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::payment_gateway::{GatewayOrder, GatewayOrderRequest, PaymentGateway},
        use_cases::{
            payments::PaymentOrderRepo,
            plans::PlanRepo,
            subscriptions::{
                SubscriptionEventRepo, SubscriptionListFilter, SubscriptionRepo,
                SubscriptionWithContext,
            },
        },
    },
    domain::entities::{
        payment_order::PaymentOrder,
        plan::Plan,
        subscription::Subscription,
        subscription_event::{NewSubscriptionEvent, SubscriptionEvent},
    },
    test_utils::InMemoryUserRepo,
};

// ============================================================================
// Plans
// ============================================================================

#[derive(Default)]
pub struct InMemoryPlanRepo {
    pub plans: Mutex<HashMap<Uuid, Plan>>,
}

impl InMemoryPlanRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plans(plans: Vec<Plan>) -> Self {
        Self {
            plans: Mutex::new(plans.into_iter().map(|p| (p.id, p)).collect()),
        }
    }
}

#[async_trait]
impl PlanRepo for InMemoryPlanRepo {
    async fn create(&self, plan: &Plan) -> AppResult<()> {
        self.plans.lock().unwrap().insert(plan.id, plan.clone());
        Ok(())
    }

    async fn update(&self, plan: &Plan) -> AppResult<()> {
        let mut plans = self.plans.lock().unwrap();
        match plans.get_mut(&plan.id) {
            Some(existing) => {
                *existing = plan.clone();
                Ok(())
            }
            None => Err(AppError::NotFound),
        }
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        Ok(self.plans.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self, include_archived: bool) -> AppResult<Vec<Plan>> {
        let mut plans: Vec<Plan> = self
            .plans
            .lock()
            .unwrap()
            .values()
            .filter(|p| include_archived || p.is_active)
            .cloned()
            .collect();
        plans.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(plans)
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Enforces at most one live subscription per user, like the partial unique
/// index in Postgres.
#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<HashMap<Uuid, Subscription>>,
    // Joined into list results when linked
    pub plan_repo: Option<Arc<InMemoryPlanRepo>>,
    pub user_repo: Option<Arc<InMemoryUserRepo>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriptions(subscriptions: Vec<Subscription>) -> Self {
        Self {
            subscriptions: Mutex::new(subscriptions.into_iter().map(|s| (s.id, s)).collect()),
            ..Default::default()
        }
    }

    /// Link the repos used to fill plan names and user emails in `list`.
    pub fn with_directory(
        mut self,
        plan_repo: Arc<InMemoryPlanRepo>,
        user_repo: Arc<InMemoryUserRepo>,
    ) -> Self {
        self.plan_repo = Some(plan_repo);
        self.user_repo = Some(user_repo);
        self
    }

    pub fn get(&self, id: Uuid) -> Option<Subscription> {
        self.subscriptions.lock().unwrap().get(&id).cloned()
    }

    fn other_live_exists(map: &HashMap<Uuid, Subscription>, sub: &Subscription) -> bool {
        map.values()
            .any(|s| s.user_id == sub.user_id && s.id != sub.id && s.status.is_live())
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn create(&self, sub: &Subscription) -> AppResult<()> {
        let mut map = self.subscriptions.lock().unwrap();
        if sub.status.is_live() && Self::other_live_exists(&map, sub) {
            return Err(AppError::Conflict(
                "User already has a live subscription".into(),
            ));
        }
        map.insert(sub.id, sub.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self.get(id))
    }

    async fn get_live_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .find(|s| s.user_id == user_id && s.status.is_live())
            .cloned())
    }

    async fn get_latest_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn list(
        &self,
        filter: &SubscriptionListFilter,
    ) -> AppResult<(Vec<SubscriptionWithContext>, i64)> {
        let mut matching: Vec<Subscription> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| filter.status.is_none_or(|status| s.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;

        let mut rows = Vec::new();
        for sub in matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
        {
            let plan_name = match &self.plan_repo {
                Some(plans) => plans.get_by_id(sub.plan_id).await?.map(|p| p.name),
                None => None,
            };
            let user_email = match &self.user_repo {
                Some(users) => users
                    .users
                    .lock()
                    .unwrap()
                    .get(&sub.user_id)
                    .map(|u| u.email.clone())
                    .unwrap_or_default(),
                None => String::new(),
            };
            rows.push(SubscriptionWithContext {
                subscription: sub,
                plan_name,
                user_email,
            });
        }
        Ok((rows, total))
    }

    async fn update_if_status(
        &self,
        sub: &Subscription,
        expected: SubscriptionStatus,
    ) -> AppResult<bool> {
        let mut map = self.subscriptions.lock().unwrap();
        let live_clash = sub.status.is_live() && Self::other_live_exists(&map, sub);
        let Some(stored) = map.get_mut(&sub.id) else {
            return Ok(false);
        };
        if stored.status != expected {
            return Ok(false);
        }
        if live_clash {
            return Err(AppError::Conflict(
                "User already has a live subscription".into(),
            ));
        }
        let notes = std::mem::take(&mut stored.notes);
        *stored = sub.clone();
        stored.notes = notes;
        Ok(true)
    }

    async fn append_note(&self, id: Uuid, note: &SubscriptionNote) -> AppResult<bool> {
        let mut map = self.subscriptions.lock().unwrap();
        match map.get_mut(&id) {
            Some(sub) => {
                sub.notes.push(note.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_due_for_sweep(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                matches!(
                    s.status,
                    SubscriptionStatus::Active | SubscriptionStatus::GracePeriod
                ) && s.end_date <= now
            })
            .cloned()
            .collect())
    }
}

/// Wraps an in-memory repo so that the next guarded write loses to a
/// concurrent writer, as if the status changed between read and write.
pub struct RacingSubscriptionRepo {
    pub inner: Arc<InMemorySubscriptionRepo>,
    lose_next: AtomicBool,
}

impl RacingSubscriptionRepo {
    pub fn new(inner: Arc<InMemorySubscriptionRepo>) -> Self {
        Self {
            inner,
            lose_next: AtomicBool::new(false),
        }
    }

    pub fn lose_next_write(&self) {
        self.lose_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubscriptionRepo for RacingSubscriptionRepo {
    async fn create(&self, sub: &Subscription) -> AppResult<()> {
        self.inner.create(sub).await
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        self.inner.get_by_id(id).await
    }

    async fn get_live_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        self.inner.get_live_for_user(user_id).await
    }

    async fn get_latest_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        self.inner.get_latest_for_user(user_id).await
    }

    async fn list(
        &self,
        filter: &SubscriptionListFilter,
    ) -> AppResult<(Vec<SubscriptionWithContext>, i64)> {
        self.inner.list(filter).await
    }

    async fn update_if_status(
        &self,
        sub: &Subscription,
        expected: SubscriptionStatus,
    ) -> AppResult<bool> {
        if self.lose_next.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.update_if_status(sub, expected).await
    }

    async fn append_note(&self, id: Uuid, note: &SubscriptionNote) -> AppResult<bool> {
        self.inner.append_note(id, note).await
    }

    async fn list_due_for_sweep(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        self.inner.list_due_for_sweep(now).await
    }
}

// ============================================================================
// Subscription events
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionEventRepo {
    pub events: Mutex<Vec<SubscriptionEvent>>,
}

impl InMemorySubscriptionEventRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event types recorded for `subscription_id`, oldest first.
    pub fn types_for(&self, subscription_id: Uuid) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.subscription_id == subscription_id)
            .map(|e| e.event_type.clone())
            .collect()
    }
}

#[async_trait]
impl SubscriptionEventRepo for InMemorySubscriptionEventRepo {
    async fn create(&self, event: &NewSubscriptionEvent) -> AppResult<()> {
        self.events.lock().unwrap().push(SubscriptionEvent {
            id: Uuid::new_v4(),
            subscription_id: event.subscription_id,
            event_type: event.event_type.to_string(),
            previous_status: event.previous_status,
            new_status: event.new_status,
            metadata: event.metadata.clone(),
            created_by: event.created_by,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<SubscriptionEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.subscription_id == subscription_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Payment orders
// ============================================================================

#[derive(Default)]
pub struct InMemoryPaymentOrderRepo {
    pub orders: Mutex<HashMap<Uuid, PaymentOrder>>,
}

impl InMemoryPaymentOrderRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, razorpay_order_id: &str) -> Option<PaymentOrder> {
        self.orders
            .lock()
            .unwrap()
            .values()
            .find(|o| o.razorpay_order_id == razorpay_order_id)
            .cloned()
    }
}

#[async_trait]
impl PaymentOrderRepo for InMemoryPaymentOrderRepo {
    async fn create(&self, order: &PaymentOrder) -> AppResult<()> {
        let mut orders = self.orders.lock().unwrap();
        if orders
            .values()
            .any(|o| o.razorpay_order_id == order.razorpay_order_id)
        {
            return Err(AppError::Conflict("Order already recorded".into()));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_by_gateway_order_id(
        &self,
        razorpay_order_id: &str,
    ) -> AppResult<Option<PaymentOrder>> {
        Ok(self.find(razorpay_order_id))
    }

    async fn payment_id_used(&self, razorpay_payment_id: &str) -> AppResult<bool> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .any(|o| o.razorpay_payment_id.as_deref() == Some(razorpay_payment_id)))
    }

    async fn mark_paid(
        &self,
        id: Uuid,
        razorpay_payment_id: &str,
        paid_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Created => {
                order.status = OrderStatus::Paid;
                order.razorpay_payment_id = Some(razorpay_payment_id.to_string());
                order.paid_at = Some(paid_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, id: Uuid) -> AppResult<bool> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Created => {
                order.status = OrderStatus::Failed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reopen(&self, id: Uuid) -> AppResult<bool> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Paid => {
                order.status = OrderStatus::Created;
                order.razorpay_payment_id = None;
                order.paid_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ============================================================================
// Gateway stubs
// ============================================================================

/// Gateway that is always down.
#[derive(Default)]
pub struct FailingGateway;

#[async_trait]
impl PaymentGateway for FailingGateway {
    fn key_id(&self) -> &str {
        "rzp_test_failing"
    }

    async fn create_order(&self, _request: &GatewayOrderRequest) -> AppResult<GatewayOrder> {
        Err(AppError::Gateway("Razorpay unavailable".into()))
    }
}

/// Gateway that records every request and hands out sequential order ids.
#[derive(Default)]
pub struct RecordingGateway {
    pub requests: Mutex<Vec<GatewayOrderRequest>>,
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    fn key_id(&self) -> &str {
        "rzp_test_recording"
    }

    async fn create_order(&self, request: &GatewayOrderRequest) -> AppResult<GatewayOrder> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(GatewayOrder {
            id: format!("order_test_{}", requests.len()),
            amount_paise: request.amount_paise,
            currency: request.currency.clone(),
        })
    }
}
