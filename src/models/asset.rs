//! Asset: external entity, read-only from the core's perspective.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Asset {
    pub asset_id: i64,
    pub is_active: bool,
    pub current_price: Decimal,
}
