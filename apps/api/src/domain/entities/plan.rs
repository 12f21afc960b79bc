use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use verdant_types::PlanDetails;

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Price in paise (1/100 INR)
    pub price_paise: i64,
    pub currency: String,
    pub duration_days: i32,
    pub features: Vec<String>,
    /// Archived plans stay referenced by old subscriptions but cannot be bought.
    pub is_active: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    pub fn duration(&self) -> Duration {
        Duration::days(i64::from(self.duration_days))
    }

    pub fn to_details(&self) -> PlanDetails {
        PlanDetails {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            price_paise: self.price_paise,
            currency: self.currency.clone(),
            duration_days: self.duration_days,
            features: self.features.clone(),
            is_active: self.is_active,
            display_order: self.display_order,
        }
    }
}
