use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::plans::PlanRepo,
    domain::entities::plan::Plan,
};

const SELECT_COLS: &str = r#"
    id, name, description, price_paise, currency, duration_days,
    features, is_active, display_order, created_at, updated_at
"#;

fn row_to_plan(row: sqlx::postgres::PgRow) -> Plan {
    let id: Uuid = row.get("id");
    let features_json: serde_json::Value = row.get("features");
    Plan {
        id,
        name: row.get("name"),
        description: row.get("description"),
        price_paise: row.get("price_paise"),
        currency: row.get("currency"),
        duration_days: row.get("duration_days"),
        features: parse_json_with_fallback(&features_json, "features", "plan", &id.to_string()),
        is_active: row.get("is_active"),
        display_order: row.get("display_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl PlanRepo for PostgresPersistence {
    async fn create(&self, plan: &Plan) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO plans
                (id, name, description, price_paise, currency, duration_days,
                 features, is_active, display_order, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(plan.id)
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(plan.price_paise)
        .bind(&plan.currency)
        .bind(plan.duration_days)
        .bind(serde_json::json!(plan.features))
        .bind(plan.is_active)
        .bind(plan.display_order)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn update(&self, plan: &Plan) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE plans SET
                name = $2,
                description = $3,
                price_paise = $4,
                currency = $5,
                duration_days = $6,
                features = $7,
                is_active = $8,
                display_order = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(plan.id)
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(plan.price_paise)
        .bind(&plan.currency)
        .bind(plan.duration_days)
        .bind(serde_json::json!(plan.features))
        .bind(plan.is_active)
        .bind(plan.display_order)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        let row = sqlx::query(&format!("SELECT {} FROM plans WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_plan))
    }

    async fn list(&self, include_archived: bool) -> AppResult<Vec<Plan>> {
        let query = if include_archived {
            format!("SELECT {} FROM plans ORDER BY display_order, name", SELECT_COLS)
        } else {
            format!(
                "SELECT {} FROM plans WHERE is_active = true ORDER BY display_order, name",
                SELECT_COLS
            )
        };
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_plan).collect())
    }
}
