use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;
use verdant_types::{SubscriptionNote, SubscriptionStatus};

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::subscriptions::{
        SubscriptionListFilter, SubscriptionRepo, SubscriptionWithContext,
    },
    domain::entities::subscription::Subscription,
};

const SELECT_COLS: &str = r#"
    s.id, s.user_id, s.plan_id, s.status, s.start_date, s.end_date,
    s.renewal_count, s.payment_method, s.transaction_id, s.notes,
    s.razorpay_order_id, s.razorpay_payment_id, s.razorpay_signature,
    s.cancelled_at, s.cancellation_reason, s.created_at, s.updated_at
"#;

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Subscription {
    let id: Uuid = row.get("id");
    let notes_json: serde_json::Value = row.get("notes");
    Subscription {
        id,
        user_id: row.get("user_id"),
        plan_id: row.get("plan_id"),
        status: row.get("status"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        renewal_count: row.get("renewal_count"),
        payment_method: row.get("payment_method"),
        transaction_id: row.get("transaction_id"),
        notes: parse_json_with_fallback(&notes_json, "notes", "subscription", &id.to_string()),
        razorpay_order_id: row.get("razorpay_order_id"),
        razorpay_payment_id: row.get("razorpay_payment_id"),
        razorpay_signature: row.get("razorpay_signature"),
        cancelled_at: row.get("cancelled_at"),
        cancellation_reason: row.get("cancellation_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const LIVE_STATUSES: &str = "('pending', 'active', 'grace_period')";

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn create(&self, sub: &Subscription) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (id, user_id, plan_id, status, start_date, end_date, renewal_count,
                 payment_method, transaction_id, notes, razorpay_order_id,
                 razorpay_payment_id, razorpay_signature, cancelled_at,
                 cancellation_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(sub.id)
        .bind(sub.user_id)
        .bind(sub.plan_id)
        .bind(sub.status)
        .bind(sub.start_date)
        .bind(sub.end_date)
        .bind(sub.renewal_count)
        .bind(sub.payment_method)
        .bind(&sub.transaction_id)
        .bind(serde_json::json!(sub.notes))
        .bind(&sub.razorpay_order_id)
        .bind(&sub.razorpay_payment_id)
        .bind(&sub.razorpay_signature)
        .bind(sub.cancelled_at)
        .bind(&sub.cancellation_reason)
        .bind(sub.created_at)
        .bind(sub.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions s WHERE s.id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn get_live_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions s WHERE s.user_id = $1 AND s.status IN {}",
            SELECT_COLS, LIVE_STATUSES
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn get_latest_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions s
            WHERE s.user_id = $1
            ORDER BY s.created_at DESC
            LIMIT 1
            "#,
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn list(
        &self,
        filter: &SubscriptionListFilter,
    ) -> AppResult<(Vec<SubscriptionWithContext>, i64)> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}, p.name as plan_name, u.email as user_email
            FROM subscriptions s
            JOIN users u ON u.id = s.user_id
            LEFT JOIN plans p ON p.id = s.plan_id
            WHERE ($1::subscription_status IS NULL OR s.status = $1)
            ORDER BY s.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            SELECT_COLS
        ))
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subscriptions WHERE ($1::subscription_status IS NULL OR status = $1)",
        )
        .bind(filter.status)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        let items = rows
            .iter()
            .map(|row| SubscriptionWithContext {
                subscription: row_to_subscription(row),
                plan_name: row.get("plan_name"),
                user_email: row.get("user_email"),
            })
            .collect();
        Ok((items, total))
    }

    async fn update_if_status(
        &self,
        sub: &Subscription,
        expected: SubscriptionStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                plan_id = $3,
                status = $4,
                start_date = $5,
                end_date = $6,
                renewal_count = $7,
                payment_method = $8,
                transaction_id = $9,
                razorpay_order_id = $10,
                razorpay_payment_id = $11,
                razorpay_signature = $12,
                cancelled_at = $13,
                cancellation_reason = $14,
                updated_at = $15
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(sub.id)
        .bind(expected)
        .bind(sub.plan_id)
        .bind(sub.status)
        .bind(sub.start_date)
        .bind(sub.end_date)
        .bind(sub.renewal_count)
        .bind(sub.payment_method)
        .bind(&sub.transaction_id)
        .bind(&sub.razorpay_order_id)
        .bind(&sub.razorpay_payment_id)
        .bind(&sub.razorpay_signature)
        .bind(sub.cancelled_at)
        .bind(&sub.cancellation_reason)
        .bind(sub.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_note(&self, id: Uuid, note: &SubscriptionNote) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET notes = notes || $2::jsonb, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(serde_json::json!([note]))
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_due_for_sweep(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions s
            WHERE s.status IN ('active', 'grace_period') AND s.end_date <= $1
            ORDER BY s.end_date
            "#,
            SELECT_COLS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }
}
