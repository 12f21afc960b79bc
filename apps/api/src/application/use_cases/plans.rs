use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;
use verdant_types::{CreatePlanRequest, UpdatePlanRequest};

use crate::{
    app_error::{AppError, AppResult},
    application::validators::{MAX_NAME_LEN, clean_text, is_valid_currency, is_valid_duration_days},
    domain::entities::plan::Plan,
};

pub const DEFAULT_CURRENCY: &str = "INR";

#[async_trait]
pub trait PlanRepo: Send + Sync {
    async fn create(&self, plan: &Plan) -> AppResult<()>;
    async fn update(&self, plan: &Plan) -> AppResult<()>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>>;
    /// Ordered by `display_order`, then name.
    async fn list(&self, include_archived: bool) -> AppResult<Vec<Plan>>;
}

#[derive(Clone)]
pub struct PlanUseCases {
    repo: Arc<dyn PlanRepo>,
}

impl PlanUseCases {
    pub fn new(repo: Arc<dyn PlanRepo>) -> Self {
        Self { repo }
    }

    /// Plans open for purchase.
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> AppResult<Vec<Plan>> {
        self.repo.list(false).await
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> AppResult<Vec<Plan>> {
        self.repo.list(true).await
    }

    /// Public lookup; archived plans are hidden.
    #[instrument(skip(self))]
    pub async fn get_active(&self, id: Uuid) -> AppResult<Plan> {
        match self.repo.get_by_id(id).await? {
            Some(plan) if plan.is_active => Ok(plan),
            _ => Err(AppError::NotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> AppResult<Plan> {
        self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn create(&self, req: CreatePlanRequest) -> AppResult<Plan> {
        let currency = req
            .currency
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        if !is_valid_currency(&currency) {
            return Err(AppError::InvalidInput(
                "Currency must be a three-letter code".into(),
            ));
        }

        let now = Utc::now();
        let plan = Plan {
            id: Uuid::new_v4(),
            name: clean_text(&req.name, "Name", MAX_NAME_LEN).map_err(AppError::InvalidInput)?,
            description: clean_description(req.description),
            price_paise: check_price(req.price_paise)?,
            currency,
            duration_days: check_duration(req.duration_days)?,
            features: clean_features(req.features),
            is_active: true,
            display_order: req.display_order.unwrap_or(0),
            created_at: now,
            updated_at: now,
        };
        self.repo.create(&plan).await?;

        info!(plan_id = %plan.id, name = %plan.name, "Plan created");
        Ok(plan)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: Uuid, req: UpdatePlanRequest) -> AppResult<Plan> {
        let mut plan = self.get(id).await?;

        if let Some(name) = req.name {
            plan.name = clean_text(&name, "Name", MAX_NAME_LEN).map_err(AppError::InvalidInput)?;
        }
        if req.description.is_some() {
            plan.description = clean_description(req.description);
        }
        if let Some(price) = req.price_paise {
            plan.price_paise = check_price(price)?;
        }
        if let Some(days) = req.duration_days {
            plan.duration_days = check_duration(days)?;
        }
        if let Some(features) = req.features {
            plan.features = clean_features(features);
        }
        if let Some(is_active) = req.is_active {
            plan.is_active = is_active;
        }
        if let Some(order) = req.display_order {
            plan.display_order = order;
        }
        plan.updated_at = Utc::now();

        self.repo.update(&plan).await?;
        Ok(plan)
    }

    /// Soft delete: existing subscriptions keep pointing at the plan.
    #[instrument(skip(self))]
    pub async fn archive(&self, id: Uuid) -> AppResult<Plan> {
        let mut plan = self.get(id).await?;
        if plan.is_active {
            plan.is_active = false;
            plan.updated_at = Utc::now();
            self.repo.update(&plan).await?;
            info!(plan_id = %plan.id, "Plan archived");
        }
        Ok(plan)
    }
}

fn check_price(price_paise: i64) -> AppResult<i64> {
    if price_paise <= 0 {
        return Err(AppError::InvalidInput("Price must be positive".into()));
    }
    Ok(price_paise)
}

fn check_duration(days: i32) -> AppResult<i32> {
    if !is_valid_duration_days(i64::from(days)) {
        return Err(AppError::InvalidInput(
            "Duration must be between 1 and 3650 days".into(),
        ));
    }
    Ok(days)
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn clean_features(features: Vec<String>) -> Vec<String> {
    features
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}
