//! Holding: an investor's position in one asset.
//!
//! A holding row is deleted once a sell reduces its quantity to zero (see
//! `services::holdings`) rather than retained at `quantity = 0`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Holding {
    pub investor_id: i64,
    pub asset_id: i64,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub updated_at: DateTime<Utc>,
}
