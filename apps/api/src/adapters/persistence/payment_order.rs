use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::payments::PaymentOrderRepo,
    domain::entities::payment_order::PaymentOrder,
};

const SELECT_COLS: &str = r#"
    id, razorpay_order_id, user_id, plan_id, subscription_id, purpose,
    amount_paise, currency, status, razorpay_payment_id, created_at, paid_at
"#;

fn row_to_order(row: sqlx::postgres::PgRow) -> PaymentOrder {
    PaymentOrder {
        id: row.get("id"),
        razorpay_order_id: row.get("razorpay_order_id"),
        user_id: row.get("user_id"),
        plan_id: row.get("plan_id"),
        subscription_id: row.get("subscription_id"),
        purpose: row.get("purpose"),
        amount_paise: row.get("amount_paise"),
        currency: row.get("currency"),
        status: row.get("status"),
        razorpay_payment_id: row.get("razorpay_payment_id"),
        created_at: row.get("created_at"),
        paid_at: row.get("paid_at"),
    }
}

#[async_trait]
impl PaymentOrderRepo for PostgresPersistence {
    async fn create(&self, order: &PaymentOrder) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_orders
                (id, razorpay_order_id, user_id, plan_id, subscription_id, purpose,
                 amount_paise, currency, status, razorpay_payment_id, created_at, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order.id)
        .bind(&order.razorpay_order_id)
        .bind(order.user_id)
        .bind(order.plan_id)
        .bind(order.subscription_id)
        .bind(order.purpose)
        .bind(order.amount_paise)
        .bind(&order.currency)
        .bind(order.status)
        .bind(&order.razorpay_payment_id)
        .bind(order.created_at)
        .bind(order.paid_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn get_by_gateway_order_id(
        &self,
        razorpay_order_id: &str,
    ) -> AppResult<Option<PaymentOrder>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_orders WHERE razorpay_order_id = $1",
            SELECT_COLS
        ))
        .bind(razorpay_order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_order))
    }

    async fn payment_id_used(&self, razorpay_payment_id: &str) -> AppResult<bool> {
        let used: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM payment_orders WHERE razorpay_payment_id = $1)",
        )
        .bind(razorpay_payment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(used)
    }

    async fn mark_paid(
        &self,
        id: Uuid,
        razorpay_payment_id: &str,
        paid_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_orders
            SET status = 'paid', razorpay_payment_id = $2, paid_at = $3
            WHERE id = $1 AND status = 'created'
            "#,
        )
        .bind(id)
        .bind(razorpay_payment_id)
        .bind(paid_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE payment_orders SET status = 'failed' WHERE id = $1 AND status = 'created'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn reopen(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_orders
            SET status = 'created', razorpay_payment_id = NULL, paid_at = NULL
            WHERE id = $1 AND status = 'paid'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() > 0)
    }
}
