use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscriptions::SubscriptionEventRepo,
    domain::entities::subscription_event::{NewSubscriptionEvent, SubscriptionEvent},
};

const SELECT_COLS: &str = r#"
    id, subscription_id, event_type, previous_status, new_status,
    metadata, created_by, created_at
"#;

fn row_to_event(row: sqlx::postgres::PgRow) -> SubscriptionEvent {
    SubscriptionEvent {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        event_type: row.get("event_type"),
        previous_status: row.get("previous_status"),
        new_status: row.get("new_status"),
        metadata: row.get("metadata"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl SubscriptionEventRepo for PostgresPersistence {
    async fn create(&self, event: &NewSubscriptionEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscription_events
                (id, subscription_id, event_type, previous_status, new_status, metadata, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.subscription_id)
        .bind(event.event_type.as_ref())
        .bind(event.previous_status)
        .bind(event.new_status)
        .bind(&event.metadata)
        .bind(event.created_by)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscription_events WHERE subscription_id = $1 ORDER BY created_at",
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_event).collect())
    }
}
