use chrono::{DateTime, Utc};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;
use verdant_types::{SubscriptionEventDetails, SubscriptionStatus};

/// Kind of entry in a subscription's audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionEventType {
    Created,
    Activated,
    PaymentFailed,
    Extended,
    PlanChanged,
    Cancelled,
    Renewed,
    NoteAdded,
    AdminOverride,
    GracePeriodStarted,
    Expired,
}

#[derive(Debug, Clone)]
pub struct SubscriptionEvent {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub event_type: String,
    pub previous_status: Option<SubscriptionStatus>,
    pub new_status: Option<SubscriptionStatus>,
    pub metadata: Value,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionEvent {
    pub fn to_details(&self) -> SubscriptionEventDetails {
        SubscriptionEventDetails {
            id: self.id,
            event_type: self.event_type.clone(),
            previous_status: self.previous_status,
            new_status: self.new_status,
            metadata: self.metadata.clone(),
            created_by: self.created_by,
            created_at: Some(self.created_at),
        }
    }
}

/// An audit entry about to be written.
#[derive(Debug, Clone)]
pub struct NewSubscriptionEvent {
    pub subscription_id: Uuid,
    pub event_type: SubscriptionEventType,
    pub previous_status: Option<SubscriptionStatus>,
    pub new_status: Option<SubscriptionStatus>,
    pub metadata: Value,
    /// `None` for system events (sweeper, gateway)
    pub created_by: Option<Uuid>,
}

impl NewSubscriptionEvent {
    pub fn new(subscription_id: Uuid, event_type: SubscriptionEventType) -> Self {
        Self {
            subscription_id,
            event_type,
            previous_status: None,
            new_status: None,
            metadata: Value::Object(Default::default()),
            created_by: None,
        }
    }

    pub fn transition(mut self, from: SubscriptionStatus, to: SubscriptionStatus) -> Self {
        self.previous_status = Some(from);
        self.new_status = Some(to);
        self
    }

    pub fn by(mut self, actor: Option<Uuid>) -> Self {
        self.created_by = actor;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
