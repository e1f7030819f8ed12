//! `(key -> orderId)` mapping recorded in the order-creation transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IdempotencyRecord {
    pub key: String,
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Outcome of reserving a key at the start of order creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// No prior record for this key; the caller must create the order.
    Created,
    /// A prior record exists; the caller must return its order as-is.
    Existing(Uuid),
}
