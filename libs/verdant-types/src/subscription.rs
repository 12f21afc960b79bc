use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Days before `end_date` during which an active subscription may be renewed.
pub const DEFAULT_RENEWAL_WINDOW_DAYS: i64 = 7;

/// Days after `end_date` before a grace-period subscription expires.
pub const DEFAULT_GRACE_PERIOD_DAYS: i64 = 7;

/// Lifecycle status of a subscription.
///
/// This is the single authority on which status changes are legal.
/// Both the backend and any UI should consult [`SubscriptionStatus::can_transition_to`]
/// and [`SubscriptionStatus::allowed_actions`] instead of comparing statuses inline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "subscription_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionStatus {
    /// Order created, payment not yet verified
    Pending,
    Active,
    /// Past `end_date` but still renewable
    GracePeriod,
    Expired,
    Cancelled,
    /// Payment verification failed
    Failed,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 6] = [
        SubscriptionStatus::Pending,
        SubscriptionStatus::Active,
        SubscriptionStatus::GracePeriod,
        SubscriptionStatus::Expired,
        SubscriptionStatus::Cancelled,
        SubscriptionStatus::Failed,
    ];

    /// Statuses reachable from this one through normal lifecycle events.
    ///
    /// The admin edit override is deliberately absent: it is applied through a
    /// separate code path and recorded as such.
    pub fn allowed_transitions(&self) -> &'static [SubscriptionStatus] {
        use SubscriptionStatus::*;
        match self {
            Pending => &[Active, Failed, Cancelled],
            Active => &[GracePeriod, Expired, Cancelled],
            GracePeriod => &[Active, Expired, Cancelled],
            Expired | Cancelled | Failed => &[],
        }
    }

    pub fn can_transition_to(&self, next: SubscriptionStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// No further lifecycle transitions are possible.
    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Whether the holder should currently get paid features.
    pub fn has_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::GracePeriod
        )
    }

    /// Occupies the user's single live subscription slot.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Pending
                | SubscriptionStatus::Active
                | SubscriptionStatus::GracePeriod
        )
    }

    /// Whether `action` may be performed in this status.
    pub fn allows(
        &self,
        action: SubscriptionAction,
        days_remaining: i64,
        renewal_window_days: i64,
    ) -> bool {
        use SubscriptionStatus::*;
        match action {
            SubscriptionAction::Extend => *self != Cancelled,
            SubscriptionAction::ChangePlan => *self == Active,
            SubscriptionAction::Cancel => self.can_transition_to(Cancelled),
            SubscriptionAction::Renew => match self {
                GracePeriod => true,
                Active => days_remaining <= renewal_window_days,
                _ => false,
            },
            SubscriptionAction::AddNote | SubscriptionAction::Edit => true,
        }
    }

    /// Every action permitted in this status, in display order.
    pub fn allowed_actions(
        &self,
        days_remaining: i64,
        renewal_window_days: i64,
    ) -> Vec<SubscriptionAction> {
        SubscriptionAction::ALL
            .into_iter()
            .filter(|a| self.allows(*a, days_remaining, renewal_window_days))
            .collect()
    }
}

/// Operations an admin or subscriber can request on an existing subscription.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionAction {
    Extend,
    ChangePlan,
    Cancel,
    Renew,
    AddNote,
    /// Admin override of dates and plan; bypasses the transition table
    Edit,
}

impl SubscriptionAction {
    pub const ALL: [SubscriptionAction; 6] = [
        SubscriptionAction::Extend,
        SubscriptionAction::ChangePlan,
        SubscriptionAction::Cancel,
        SubscriptionAction::Renew,
        SubscriptionAction::AddNote,
        SubscriptionAction::Edit,
    ];
}

/// Whole days left until `end_date`, rounded up. Never negative.
pub fn days_remaining(end_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (end_date - now).num_seconds();
    if secs <= 0 {
        return 0;
    }
    (secs + 86_399) / 86_400
}
