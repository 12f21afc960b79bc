use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use verdant_types::{
    PaymentMethod, SubscriptionAction, SubscriptionDetails, SubscriptionNote, SubscriptionStatus,
    days_remaining,
};

use super::plan::Plan;

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub renewal_count: i32,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub notes: Vec<SubscriptionNote>,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// A fresh subscription covering one plan duration from `start`.
    pub fn new(
        user_id: Uuid,
        plan: &Plan,
        status: SubscriptionStatus,
        start: DateTime<Utc>,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            plan_id: plan.id,
            status,
            start_date: start,
            end_date: start + plan.duration(),
            renewal_count: 0,
            payment_method,
            transaction_id: None,
            notes: vec![],
            razorpay_order_id: None,
            razorpay_payment_id: None,
            razorpay_signature: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        days_remaining(self.end_date, now)
    }

    pub fn allows(
        &self,
        action: SubscriptionAction,
        now: DateTime<Utc>,
        renewal_window_days: i64,
    ) -> bool {
        self.status
            .allows(action, self.days_remaining(now), renewal_window_days)
    }

    pub fn allowed_actions(
        &self,
        now: DateTime<Utc>,
        renewal_window_days: i64,
    ) -> Vec<SubscriptionAction> {
        self.status
            .allowed_actions(self.days_remaining(now), renewal_window_days)
    }

    /// The time-based transition this subscription is due for, if any.
    ///
    /// `active` decays to `grace_period` at `end_date` and both decay to
    /// `expired` at `end_date + grace_period_days`. Other statuses never decay.
    pub fn due_transition(
        &self,
        now: DateTime<Utc>,
        grace_period_days: i64,
    ) -> Option<SubscriptionStatus> {
        let grace_ends = self.end_date + Duration::days(grace_period_days);
        match self.status {
            SubscriptionStatus::Active | SubscriptionStatus::GracePeriod if now >= grace_ends => {
                Some(SubscriptionStatus::Expired)
            }
            SubscriptionStatus::Active if now >= self.end_date => {
                Some(SubscriptionStatus::GracePeriod)
            }
            _ => None,
        }
    }

    /// Add one period of `plan`, counted from the later of `end_date` and `now`.
    ///
    /// Switches to `plan` and leaves the subscription `active`.
    pub fn renew(&mut self, plan: &Plan, now: DateTime<Utc>) {
        let base = self.end_date.max(now);
        self.end_date = base + plan.duration();
        self.plan_id = plan.id;
        self.renewal_count += 1;
        self.status = SubscriptionStatus::Active;
    }

    pub fn to_details(
        &self,
        plan_name: Option<String>,
        now: DateTime<Utc>,
        renewal_window_days: i64,
    ) -> SubscriptionDetails {
        SubscriptionDetails {
            id: self.id,
            user_id: self.user_id,
            plan_id: self.plan_id,
            plan_name,
            status: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
            renewal_count: self.renewal_count,
            payment_method: self.payment_method,
            transaction_id: self.transaction_id.clone(),
            notes: self.notes.clone(),
            razorpay_order_id: self.razorpay_order_id.clone(),
            razorpay_payment_id: self.razorpay_payment_id.clone(),
            cancelled_at: self.cancelled_at,
            cancellation_reason: self.cancellation_reason.clone(),
            days_remaining: self.days_remaining(now),
            allowed_actions: self.allowed_actions(now, renewal_window_days),
            created_at: Some(self.created_at),
        }
    }
}
