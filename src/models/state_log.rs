//! Append-only audit of order status transitions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::order::OrderStatus;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderStateLog {
    pub id: Uuid,
    pub order_id: Uuid,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub reason: Option<String>,
    pub logged_by: String,
    pub logged_at: DateTime<Utc>,
}
