use chrono::Utc;
use sqlx::Postgres;
use uuid::Uuid;

use crate::models::{OrderStateLog, OrderStatus};

use super::StoreError;

pub async fn append(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    order_id: Uuid,
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    reason: Option<String>,
    logged_by: &str,
) -> Result<OrderStateLog, StoreError> {
    let log = sqlx::query_as::<_, OrderStateLog>(
        r#"
        INSERT INTO order_state_logs (
            id, order_id, from_status, to_status, reason, logged_by, logged_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, order_id, from_status, to_status, reason, logged_by, logged_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(from_status)
    .bind(to_status)
    .bind(reason)
    .bind(logged_by)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    Ok(log)
}

pub async fn history(
    pool: &sqlx::PgPool,
    order_id: Uuid,
) -> Result<Vec<OrderStateLog>, StoreError> {
    let logs = sqlx::query_as::<_, OrderStateLog>(
        r#"
        SELECT id, order_id, from_status, to_status, reason, logged_by, logged_at
        FROM order_state_logs
        WHERE order_id = $1
        ORDER BY logged_at ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(logs)
}
