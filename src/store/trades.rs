use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{OrderSide, Trade};

use super::StoreError;

pub async fn insert<'e, E>(
    exec: E,
    order_id: Uuid,
    investor_id: i64,
    asset_id: i64,
    side: OrderSide,
    quantity: Decimal,
    execution_price: Decimal,
) -> Result<Trade, StoreError>
where
    E: PgExecutor<'e>,
{
    let trade = sqlx::query_as::<_, Trade>(
        r#"
        INSERT INTO trades (
            id, order_id, investor_id, asset_id, quantity, execution_price,
            side, traded_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, order_id, investor_id, asset_id, quantity,
                  execution_price, side, traded_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(investor_id)
    .bind(asset_id)
    .bind(quantity)
    .bind(execution_price)
    .bind(side)
    .bind(Utc::now())
    .fetch_one(exec)
    .await?;

    Ok(trade)
}

pub async fn get_by_order<'e, E>(exec: E, order_id: Uuid) -> Result<Option<Trade>, StoreError>
where
    E: PgExecutor<'e>,
{
    let trade = sqlx::query_as::<_, Trade>(
        r#"
        SELECT id, order_id, investor_id, asset_id, quantity,
               execution_price, side, traded_at
        FROM trades WHERE order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(exec)
    .await?;

    Ok(trade)
}
