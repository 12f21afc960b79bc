use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use verdant_types::{
    AdminSubscriptionListItem, AdminSubscriptionView, DEFAULT_GRACE_PERIOD_DAYS,
    DEFAULT_RENEWAL_WINDOW_DAYS, OfflineSubscriptionRequest, PaginatedSubscriptions,
    PaymentMethod, SubscriptionAction, SubscriptionDetails, SubscriptionListQuery,
    SubscriptionNote, SubscriptionStatus, SubscriptionStatusResponse,
};

use crate::{
    app_error::{AppError, AppResult},
    application::{
        use_cases::{plans::PlanRepo, user::UserRepo},
        validators::{MAX_NOTE_LEN, clean_text, is_valid_duration_days},
    },
    domain::entities::{
        plan::Plan,
        subscription::Subscription,
        subscription_event::{NewSubscriptionEvent, SubscriptionEvent, SubscriptionEventType},
    },
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Actions a subscriber can take on their own subscription.
const SELF_SERVICE_ACTIONS: [SubscriptionAction; 2] =
    [SubscriptionAction::Renew, SubscriptionAction::Cancel];

#[derive(Debug, Clone, Default)]
pub struct SubscriptionListFilter {
    pub status: Option<SubscriptionStatus>,
    pub limit: i64,
    pub offset: i64,
}

/// A subscription joined with what the admin list shows next to it.
#[derive(Debug, Clone)]
pub struct SubscriptionWithContext {
    pub subscription: Subscription,
    pub plan_name: Option<String>,
    pub user_email: String,
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    /// Fails with `Conflict` if the user already has a live subscription.
    async fn create(&self, sub: &Subscription) -> AppResult<()>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>>;
    /// The user's `pending`, `active` or `grace_period` subscription.
    async fn get_live_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>>;
    async fn get_latest_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>>;
    /// Newest first, with the total matching count.
    async fn list(
        &self,
        filter: &SubscriptionListFilter,
    ) -> AppResult<(Vec<SubscriptionWithContext>, i64)>;
    /// Write every mutable column except notes, but only if the stored status
    /// is still `expected`. Returns whether the row was written.
    async fn update_if_status(
        &self,
        sub: &Subscription,
        expected: SubscriptionStatus,
    ) -> AppResult<bool>;
    /// Atomically append to the notes list. Returns false if the row is gone.
    async fn append_note(&self, id: Uuid, note: &SubscriptionNote) -> AppResult<bool>;
    /// `active` and `grace_period` subscriptions whose `end_date` has passed.
    async fn list_due_for_sweep(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>>;
}

#[async_trait]
pub trait SubscriptionEventRepo: Send + Sync {
    async fn create(&self, event: &NewSubscriptionEvent) -> AppResult<()>;
    /// Oldest first.
    async fn list_by_subscription(&self, subscription_id: Uuid)
    -> AppResult<Vec<SubscriptionEvent>>;
}

/// Time-based knobs of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub grace_period_days: i64,
    pub renewal_window_days: i64,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            grace_period_days: DEFAULT_GRACE_PERIOD_DAYS,
            renewal_window_days: DEFAULT_RENEWAL_WINDOW_DAYS,
        }
    }
}

/// Outcome of one lifecycle sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub moved_to_grace: usize,
    pub expired: usize,
    /// Changed by someone else between read and write
    pub skipped: usize,
    pub failed: usize,
}

pub(crate) fn ensure_transition(
    from: SubscriptionStatus,
    to: SubscriptionStatus,
) -> AppResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition { from, to })
    }
}

/// Persist `sub` if nobody changed its status since it was read as `expected`.
/// Stamps `updated_at`.
pub(crate) async fn save_guarded(
    repo: &dyn SubscriptionRepo,
    sub: &mut Subscription,
    expected: SubscriptionStatus,
) -> AppResult<()> {
    sub.updated_at = Utc::now();
    if repo.update_if_status(sub, expected).await? {
        Ok(())
    } else {
        warn!(subscription_id = %sub.id, expected = %expected, "Subscription status changed concurrently");
        Err(AppError::Conflict(
            "Subscription was modified concurrently, please retry".into(),
        ))
    }
}

/// Audit writes never fail the operation that triggered them.
pub(crate) async fn record_event(repo: &dyn SubscriptionEventRepo, event: NewSubscriptionEvent) {
    if let Err(e) = repo.create(&event).await {
        error!(
            subscription_id = %event.subscription_id,
            event_type = %event.event_type,
            error = ?e,
            "Failed to record subscription event"
        );
    }
}

#[derive(Clone)]
pub struct SubscriptionUseCases {
    subs: Arc<dyn SubscriptionRepo>,
    events: Arc<dyn SubscriptionEventRepo>,
    plans: Arc<dyn PlanRepo>,
    users: Arc<dyn UserRepo>,
    policy: LifecyclePolicy,
}

impl SubscriptionUseCases {
    pub fn new(
        subs: Arc<dyn SubscriptionRepo>,
        events: Arc<dyn SubscriptionEventRepo>,
        plans: Arc<dyn PlanRepo>,
        users: Arc<dyn UserRepo>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            subs,
            events,
            plans,
            users,
            policy,
        }
    }

    pub fn policy(&self) -> LifecyclePolicy {
        self.policy
    }

    async fn plan_name(&self, plan_id: Uuid) -> AppResult<Option<String>> {
        Ok(self.plans.get_by_id(plan_id).await?.map(|p| p.name))
    }

    async fn details(&self, sub: &Subscription, now: DateTime<Utc>) -> AppResult<SubscriptionDetails> {
        let plan_name = self.plan_name(sub.plan_id).await?;
        Ok(sub.to_details(plan_name, now, self.policy.renewal_window_days))
    }

    async fn load(&self, id: Uuid) -> AppResult<Subscription> {
        self.subs.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    async fn load_active_plan(&self, plan_id: Uuid) -> AppResult<Plan> {
        match self.plans.get_by_id(plan_id).await? {
            Some(plan) if plan.is_active => Ok(plan),
            Some(_) => Err(AppError::InvalidInput("Plan is archived".into())),
            None => Err(AppError::NotFound),
        }
    }

    fn ensure_allowed(
        &self,
        sub: &Subscription,
        action: SubscriptionAction,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if sub.allows(action, now, self.policy.renewal_window_days) {
            Ok(())
        } else {
            Err(AppError::ActionNotAllowed {
                action,
                status: sub.status,
            })
        }
    }

    /// The live subscription if there is one, otherwise the most recent.
    async fn current_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        if let Some(live) = self.subs.get_live_for_user(user_id).await? {
            return Ok(Some(live));
        }
        self.subs.get_latest_for_user(user_id).await
    }

    // ------------------------------------------------------------------
    // Subscriber
    // ------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn my_subscription(&self, user_id: Uuid) -> AppResult<SubscriptionDetails> {
        let sub = self
            .current_for_user(user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.details(&sub, Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn my_status(&self, user_id: Uuid) -> AppResult<SubscriptionStatusResponse> {
        let Some(sub) = self.current_for_user(user_id).await? else {
            return Ok(SubscriptionStatusResponse::none());
        };
        let now = Utc::now();
        let has_access = sub.status.has_access();
        let allowed_actions = sub
            .allowed_actions(now, self.policy.renewal_window_days)
            .into_iter()
            .filter(|a| SELF_SERVICE_ACTIONS.contains(a))
            .collect();

        Ok(SubscriptionStatusResponse {
            has_subscription: has_access,
            status: Some(sub.status),
            plan_name: self.plan_name(sub.plan_id).await?,
            days_remaining: if has_access { sub.days_remaining(now) } else { 0 },
            end_date: Some(sub.end_date),
            allowed_actions,
        })
    }

    #[instrument(skip(self))]
    pub async fn cancel_mine(
        &self,
        user_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<SubscriptionDetails> {
        let sub = self
            .subs
            .get_live_for_user(user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.cancel_subscription(sub, reason, user_id).await
    }

    // ------------------------------------------------------------------
    // Admin
    // ------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn list(&self, query: SubscriptionListQuery) -> AppResult<PaginatedSubscriptions> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query
            .per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let filter = SubscriptionListFilter {
            status: query.status,
            limit: per_page,
            offset: (page - 1) * per_page,
        };

        let (rows, total) = self.subs.list(&filter).await?;
        let now = Utc::now();
        let items = rows
            .into_iter()
            .map(|row| AdminSubscriptionListItem {
                subscription: row.subscription.to_details(
                    row.plan_name,
                    now,
                    self.policy.renewal_window_days,
                ),
                user_email: row.user_email,
            })
            .collect();

        Ok(PaginatedSubscriptions {
            items,
            total,
            page,
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> AppResult<AdminSubscriptionView> {
        let sub = self.load(id).await?;
        let user_email = self
            .users
            .get_by_id(sub.user_id)
            .await?
            .map(|u| u.email)
            .unwrap_or_default();
        let events = self
            .events
            .list_by_subscription(id)
            .await?
            .iter()
            .map(SubscriptionEvent::to_details)
            .collect();

        Ok(AdminSubscriptionView {
            subscription: self.details(&sub, Utc::now()).await?,
            user_email,
            events,
        })
    }

    /// Record a subscription paid outside the gateway. Starts `active`.
    #[instrument(skip(self))]
    pub async fn create_offline(
        &self,
        admin_id: Uuid,
        req: OfflineSubscriptionRequest,
    ) -> AppResult<SubscriptionDetails> {
        if !req.payment_method.is_offline() {
            return Err(AppError::InvalidInput(
                "Offline subscriptions need an offline payment method".into(),
            ));
        }
        if self.users.get_by_id(req.user_id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        let plan = self.load_active_plan(req.plan_id).await?;
        if self.subs.get_live_for_user(req.user_id).await?.is_some() {
            return Err(AppError::Conflict(
                "User already has a live subscription".into(),
            ));
        }

        let now = Utc::now();
        let mut sub = Subscription::new(
            req.user_id,
            &plan,
            SubscriptionStatus::Active,
            req.start_date.unwrap_or(now),
            req.payment_method,
            now,
        );
        sub.transaction_id = req.transaction_id.clone();
        if let Some(text) = req.note.as_deref() {
            sub.notes.push(SubscriptionNote {
                text: clean_text(text, "Note", MAX_NOTE_LEN).map_err(AppError::InvalidInput)?,
                author_id: Some(admin_id),
                created_at: now,
            });
        }
        self.subs.create(&sub).await?;

        record_event(
            self.events.as_ref(),
            NewSubscriptionEvent::new(sub.id, SubscriptionEventType::Created)
                .by(Some(admin_id))
                .with_metadata(json!({
                    "payment_method": sub.payment_method,
                    "transaction_id": sub.transaction_id,
                    "plan_id": plan.id,
                })),
        )
        .await;

        info!(subscription_id = %sub.id, user_id = %sub.user_id, method = %sub.payment_method, "Offline subscription created");
        self.details(&sub, now).await
    }

    /// Push `end_date` out by `days`. A grace-period subscription that ends
    /// up in the future again becomes `active`.
    #[instrument(skip(self))]
    pub async fn extend(&self, admin_id: Uuid, id: Uuid, days: i64) -> AppResult<SubscriptionDetails> {
        if !is_valid_duration_days(days) {
            return Err(AppError::InvalidInput(
                "Days must be between 1 and 3650".into(),
            ));
        }
        let now = Utc::now();
        let mut sub = self.load(id).await?;
        self.ensure_allowed(&sub, SubscriptionAction::Extend, now)?;

        let previous = sub.status;
        let previous_end = sub.end_date;
        sub.end_date += Duration::days(days);
        if previous == SubscriptionStatus::GracePeriod && sub.end_date > now {
            ensure_transition(previous, SubscriptionStatus::Active)?;
            sub.status = SubscriptionStatus::Active;
        }
        save_guarded(self.subs.as_ref(), &mut sub, previous).await?;

        let mut event = NewSubscriptionEvent::new(sub.id, SubscriptionEventType::Extended)
            .by(Some(admin_id))
            .with_metadata(json!({
                "days": days,
                "previous_end_date": previous_end,
                "new_end_date": sub.end_date,
            }));
        if previous != sub.status {
            event = event.transition(previous, sub.status);
        }
        record_event(self.events.as_ref(), event).await;

        self.details(&sub, now).await
    }

    /// Switch an active subscription to another plan. Dates are kept.
    #[instrument(skip(self))]
    pub async fn change_plan(
        &self,
        admin_id: Uuid,
        id: Uuid,
        plan_id: Uuid,
    ) -> AppResult<SubscriptionDetails> {
        let now = Utc::now();
        let mut sub = self.load(id).await?;
        self.ensure_allowed(&sub, SubscriptionAction::ChangePlan, now)?;
        if sub.plan_id == plan_id {
            return Err(AppError::InvalidInput(
                "Subscription is already on this plan".into(),
            ));
        }
        let plan = self.load_active_plan(plan_id).await?;

        let previous_plan = sub.plan_id;
        sub.plan_id = plan.id;
        let status = sub.status;
        save_guarded(self.subs.as_ref(), &mut sub, status).await?;

        record_event(
            self.events.as_ref(),
            NewSubscriptionEvent::new(sub.id, SubscriptionEventType::PlanChanged)
                .by(Some(admin_id))
                .with_metadata(json!({ "from_plan_id": previous_plan, "to_plan_id": plan.id })),
        )
        .await;

        Ok(sub.to_details(Some(plan.name), now, self.policy.renewal_window_days))
    }

    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        admin_id: Uuid,
        id: Uuid,
        reason: Option<String>,
    ) -> AppResult<SubscriptionDetails> {
        let sub = self.load(id).await?;
        self.cancel_subscription(sub, reason, admin_id).await
    }

    async fn cancel_subscription(
        &self,
        mut sub: Subscription,
        reason: Option<String>,
        actor: Uuid,
    ) -> AppResult<SubscriptionDetails> {
        let now = Utc::now();
        self.ensure_allowed(&sub, SubscriptionAction::Cancel, now)?;
        ensure_transition(sub.status, SubscriptionStatus::Cancelled)?;

        let previous = sub.status;
        sub.status = SubscriptionStatus::Cancelled;
        sub.cancelled_at = Some(now);
        sub.cancellation_reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        save_guarded(self.subs.as_ref(), &mut sub, previous).await?;

        record_event(
            self.events.as_ref(),
            NewSubscriptionEvent::new(sub.id, SubscriptionEventType::Cancelled)
                .transition(previous, SubscriptionStatus::Cancelled)
                .by(Some(actor))
                .with_metadata(json!({ "reason": sub.cancellation_reason })),
        )
        .await;

        info!(subscription_id = %sub.id, actor = %actor, "Subscription cancelled");
        self.details(&sub, now).await
    }

    /// Record an offline renewal payment for the current plan.
    #[instrument(skip(self))]
    pub async fn renew(
        &self,
        admin_id: Uuid,
        id: Uuid,
        payment_method: PaymentMethod,
        transaction_id: Option<String>,
    ) -> AppResult<SubscriptionDetails> {
        if !payment_method.is_offline() {
            return Err(AppError::InvalidInput(
                "Online renewals go through checkout".into(),
            ));
        }
        let now = Utc::now();
        let mut sub = self.load(id).await?;
        self.ensure_allowed(&sub, SubscriptionAction::Renew, now)?;
        let plan = self
            .plans
            .get_by_id(sub.plan_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let previous = sub.status;
        let previous_end = sub.end_date;
        if previous != SubscriptionStatus::Active {
            ensure_transition(previous, SubscriptionStatus::Active)?;
        }
        sub.renew(&plan, now);
        sub.payment_method = payment_method;
        sub.transaction_id = transaction_id;
        save_guarded(self.subs.as_ref(), &mut sub, previous).await?;

        let mut event = NewSubscriptionEvent::new(sub.id, SubscriptionEventType::Renewed)
            .by(Some(admin_id))
            .with_metadata(json!({
                "payment_method": payment_method,
                "transaction_id": sub.transaction_id,
                "previous_end_date": previous_end,
                "new_end_date": sub.end_date,
                "renewal_count": sub.renewal_count,
            }));
        if previous != sub.status {
            event = event.transition(previous, sub.status);
        }
        record_event(self.events.as_ref(), event).await;

        Ok(sub.to_details(Some(plan.name), now, self.policy.renewal_window_days))
    }

    #[instrument(skip(self, text))]
    pub async fn add_note(&self, admin_id: Uuid, id: Uuid, text: &str) -> AppResult<SubscriptionDetails> {
        let text = clean_text(text, "Note", MAX_NOTE_LEN).map_err(AppError::InvalidInput)?;
        let now = Utc::now();
        let sub = self.load(id).await?;
        self.ensure_allowed(&sub, SubscriptionAction::AddNote, now)?;

        let note = SubscriptionNote {
            text,
            author_id: Some(admin_id),
            created_at: now,
        };
        if !self.subs.append_note(id, &note).await? {
            return Err(AppError::NotFound);
        }
        record_event(
            self.events.as_ref(),
            NewSubscriptionEvent::new(id, SubscriptionEventType::NoteAdded).by(Some(admin_id)),
        )
        .await;

        let sub = self.load(id).await?;
        self.details(&sub, now).await
    }

    /// Admin edit: force `active` with a new `end_date` (and optionally plan),
    /// whatever the current status.
    #[instrument(skip(self))]
    pub async fn admin_override(
        &self,
        admin_id: Uuid,
        id: Uuid,
        end_date: DateTime<Utc>,
        plan_id: Option<Uuid>,
    ) -> AppResult<SubscriptionDetails> {
        let now = Utc::now();
        let mut sub = self.load(id).await?;
        self.ensure_allowed(&sub, SubscriptionAction::Edit, now)?;
        if end_date <= sub.start_date {
            return Err(AppError::InvalidInput(
                "End date must be after the start date".into(),
            ));
        }
        if let Some(plan_id) = plan_id
            && self.plans.get_by_id(plan_id).await?.is_none()
        {
            return Err(AppError::NotFound);
        }
        if !sub.status.is_live()
            && let Some(other) = self.subs.get_live_for_user(sub.user_id).await?
            && other.id != sub.id
        {
            return Err(AppError::Conflict(
                "User already has another live subscription".into(),
            ));
        }

        let previous = sub.status;
        let previous_end = sub.end_date;
        let previous_plan = sub.plan_id;
        sub.status = SubscriptionStatus::Active;
        sub.end_date = end_date;
        sub.plan_id = plan_id.unwrap_or(sub.plan_id);
        sub.cancelled_at = None;
        sub.cancellation_reason = None;
        save_guarded(self.subs.as_ref(), &mut sub, previous).await?;

        record_event(
            self.events.as_ref(),
            NewSubscriptionEvent::new(sub.id, SubscriptionEventType::AdminOverride)
                .transition(previous, SubscriptionStatus::Active)
                .by(Some(admin_id))
                .with_metadata(json!({
                    "previous_end_date": previous_end,
                    "new_end_date": end_date,
                    "previous_plan_id": previous_plan,
                    "plan_id": sub.plan_id,
                })),
        )
        .await;

        info!(subscription_id = %sub.id, from = %previous, "Subscription overridden by admin");
        self.details(&sub, now).await
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Apply due time-based transitions. One failing subscription does not
    /// stop the rest.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let due = self.subs.list_due_for_sweep(now).await?;
        let mut report = SweepReport {
            examined: due.len(),
            ..Default::default()
        };

        for mut sub in due {
            let Some(next) = sub.due_transition(now, self.policy.grace_period_days) else {
                continue;
            };
            let previous = sub.status;
            if !previous.can_transition_to(next) {
                continue;
            }
            sub.status = next;
            sub.updated_at = now;

            match self.subs.update_if_status(&sub, previous).await {
                Ok(true) => {
                    let event_type = match next {
                        SubscriptionStatus::GracePeriod => {
                            report.moved_to_grace += 1;
                            SubscriptionEventType::GracePeriodStarted
                        }
                        _ => {
                            report.expired += 1;
                            SubscriptionEventType::Expired
                        }
                    };
                    record_event(
                        self.events.as_ref(),
                        NewSubscriptionEvent::new(sub.id, event_type)
                            .transition(previous, next)
                            .with_metadata(json!({ "end_date": sub.end_date })),
                    )
                    .await;
                    debug!(subscription_id = %sub.id, from = %previous, to = %next, "Lifecycle transition applied");
                }
                Ok(false) => {
                    report.skipped += 1;
                    debug!(subscription_id = %sub.id, "Subscription changed during sweep, skipping");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(subscription_id = %sub.id, error = ?e, "Lifecycle transition failed");
                }
            }
        }

        Ok(report)
    }
}
