use chrono::Utc;
use sqlx::Postgres;
use uuid::Uuid;

use crate::models::ReservationOutcome;

use super::StoreError;

/// Reserves a key inside the caller's order-creation transaction. On
/// conflict (another submission already holds the key) returns the order id
/// it points to instead of erroring.
pub async fn reserve(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    key: &str,
    order_id: Uuid,
) -> Result<ReservationOutcome, StoreError> {
    let inserted: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO idempotency_keys (key, order_id, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (key) DO NOTHING
        RETURNING order_id
        "#,
    )
    .bind(key)
    .bind(order_id)
    .bind(Utc::now())
    .fetch_optional(&mut **tx)
    .await?;

    match inserted {
        Some(_) => Ok(ReservationOutcome::Created),
        None => {
            let existing: (Uuid,) =
                sqlx::query_as("SELECT order_id FROM idempotency_keys WHERE key = $1")
                    .bind(key)
                    .fetch_one(&mut **tx)
                    .await?;
            Ok(ReservationOutcome::Existing(existing.0))
        }
    }
}
