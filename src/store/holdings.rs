use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Postgres;

use crate::models::Holding;

use super::StoreError;

/// Acquires a transaction-scoped advisory lock keyed by `(investor_id,
/// asset_id)`. `SELECT ... FOR UPDATE` can't lock a row that doesn't exist
/// yet, so opening a new position has nothing to serialize two concurrent
/// buys on: call this before `get_for_update` so the second transaction
/// blocks until the first commits, instead of both reading `None` and one
/// clobbering the other's write.
pub async fn lock(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    investor_id: i64,
    asset_id: i64,
) -> Result<(), StoreError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text || ':' || $2::text, 0))")
        .bind(investor_id)
        .bind(asset_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Locks the `(investor_id, asset_id)` row for update. Call `lock` first if
/// the row may not exist yet.
pub async fn get_for_update(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    investor_id: i64,
    asset_id: i64,
) -> Result<Option<Holding>, StoreError> {
    let holding = sqlx::query_as::<_, Holding>(
        r#"
        SELECT investor_id, asset_id, quantity, average_cost, updated_at
        FROM holdings
        WHERE investor_id = $1 AND asset_id = $2
        FOR UPDATE
        "#,
    )
    .bind(investor_id)
    .bind(asset_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(holding)
}

pub async fn upsert(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    investor_id: i64,
    asset_id: i64,
    quantity: Decimal,
    average_cost: Decimal,
) -> Result<Holding, StoreError> {
    let holding = sqlx::query_as::<_, Holding>(
        r#"
        INSERT INTO holdings (investor_id, asset_id, quantity, average_cost, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (investor_id, asset_id) DO UPDATE SET
            quantity = EXCLUDED.quantity,
            average_cost = EXCLUDED.average_cost,
            updated_at = EXCLUDED.updated_at
        RETURNING investor_id, asset_id, quantity, average_cost, updated_at
        "#,
    )
    .bind(investor_id)
    .bind(asset_id)
    .bind(quantity)
    .bind(average_cost)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    Ok(holding)
}

pub async fn delete(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    investor_id: i64,
    asset_id: i64,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM holdings WHERE investor_id = $1 AND asset_id = $2")
        .bind(investor_id)
        .bind(asset_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub async fn get(
    pool: &sqlx::PgPool,
    investor_id: i64,
    asset_id: i64,
) -> Result<Option<Holding>, StoreError> {
    let holding = sqlx::query_as::<_, Holding>(
        r#"
        SELECT investor_id, asset_id, quantity, average_cost, updated_at
        FROM holdings WHERE investor_id = $1 AND asset_id = $2
        "#,
    )
    .bind(investor_id)
    .bind(asset_id)
    .fetch_optional(pool)
    .await?;

    Ok(holding)
}
