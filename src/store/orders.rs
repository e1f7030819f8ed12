use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{Order, OrderSide, OrderStatus};

use super::StoreError;

pub struct NewOrder {
    pub investor_id: i64,
    pub asset_id: i64,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub idempotency_key: Option<String>,
}

pub async fn insert<'e, E>(exec: E, new: NewOrder) -> Result<Order, StoreError>
where
    E: PgExecutor<'e>,
{
    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (
            id, investor_id, asset_id, side, quantity, price, status,
            idempotency_key, ordered_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING
            id, investor_id, asset_id, side, quantity, price, status,
            idempotency_key, ordered_at, executed_at, settled_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.investor_id)
    .bind(new.asset_id)
    .bind(new.side)
    .bind(new.quantity)
    .bind(new.price)
    .bind(OrderStatus::New)
    .bind(new.idempotency_key)
    .bind(Utc::now())
    .fetch_one(exec)
    .await?;

    Ok(order)
}

pub async fn get<'e, E>(exec: E, order_id: Uuid) -> Result<Order, StoreError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Order>(
        r#"
        SELECT id, investor_id, asset_id, side, quantity, price, status,
               idempotency_key, ordered_at, executed_at, settled_at
        FROM orders WHERE id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(exec)
    .await?
    .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))
}

/// Locks the row for update; callers hold the surrounding transaction open
/// until they either commit the transition or release it.
pub async fn get_for_update(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: Uuid,
) -> Result<Order, StoreError> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT id, investor_id, asset_id, side, quantity, price, status,
               idempotency_key, ordered_at, executed_at, settled_at
        FROM orders WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))
}

pub async fn list_for_investor<'e, E>(
    exec: E,
    investor_id: i64,
    from_date: Option<chrono::DateTime<Utc>>,
) -> Result<Vec<Order>, StoreError>
where
    E: PgExecutor<'e>,
{
    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, investor_id, asset_id, side, quantity, price, status,
               idempotency_key, ordered_at, executed_at, settled_at
        FROM orders
        WHERE investor_id = $1 AND ($2::timestamptz IS NULL OR ordered_at >= $2)
        ORDER BY ordered_at DESC
        "#,
    )
    .bind(investor_id)
    .bind(from_date)
    .fetch_all(exec)
    .await?;

    Ok(orders)
}

/// Transitions an order's status and timestamp fields. Does not validate the
/// transition — that is `services::engine::state_machine`'s job; this is a
/// pure write.
pub async fn update_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: Uuid,
    new_status: OrderStatus,
    executed_at: Option<chrono::DateTime<Utc>>,
    settled_at: Option<chrono::DateTime<Utc>>,
) -> Result<Order, StoreError> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders
        SET status = $2,
            executed_at = COALESCE($3, executed_at),
            settled_at = COALESCE($4, settled_at)
        WHERE id = $1
        RETURNING
            id, investor_id, asset_id, side, quantity, price, status,
            idempotency_key, ordered_at, executed_at, settled_at
        "#,
    )
    .bind(order_id)
    .bind(new_status)
    .bind(executed_at)
    .bind(settled_at)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;

    Ok(order)
}

/// Orders in `Filled` with no `settled_at` yet — reconstructs pending
/// settlement jobs on startup.
pub async fn list_pending_settlement<'e, E>(exec: E) -> Result<Vec<Order>, StoreError>
where
    E: PgExecutor<'e>,
{
    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, investor_id, asset_id, side, quantity, price, status,
               idempotency_key, ordered_at, executed_at, settled_at
        FROM orders
        WHERE status = 'filled' AND settled_at IS NULL
        "#,
    )
    .fetch_all(exec)
    .await?;

    Ok(orders)
}
