//! Order entity and lifecycle vocabulary.
//!
//! Status transitions are not enforced here — they live in
//! `services::engine::state_machine`. This module only carries the shape of
//! an order and the wire vocabulary clients see.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Buy or sell side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_side", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Lifecycle status of an order.
///
/// ```text
///                 (create)
///           ┌──────────────▶ New
///           │                │
///           │                ▼
///           │            Validating
///           │           ┌────┴─────┐
///           │           ▼          ▼
///           │       Validated   Rejected (terminal)
///           │           │
///           │           ▼
///           │       Executing
///           │       ┌───┴────┐
///           │       ▼        ▼
///           │     Filled   Rejected
///           │       │
///           │       ▼ (delay)
///           │     Settled (terminal)
///           │
///           └─ Cancelled (terminal) — only from {New, Validated}
/// ```
///
/// See `services::engine::state_machine` for the transition table this
/// diagram is the source of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Validating,
    Validated,
    Executing,
    Filled,
    Settled,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    /// No transition is legal out of a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Rejected | OrderStatus::Settled | OrderStatus::Cancelled
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::Validating => "VALIDATING",
            OrderStatus::Validated => "VALIDATED",
            OrderStatus::Executing => "EXECUTING",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Settled => "SETTLED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub investor_id: i64,
    pub asset_id: i64,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub status: OrderStatus,
    pub idempotency_key: Option<String>,
    pub ordered_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Absent price means a market order, filled at the asset's reference price.
    pub fn is_market(&self) -> bool {
        self.price.is_none()
    }
}

/// `POST /orders` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub investor_id: i64,
    pub asset_id: i64,
    #[serde(rename = "orderType")]
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
}

/// `202 Accepted` response for `POST /orders`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

impl From<&Order> for CreateOrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            status: order.status,
        }
    }
}

/// Full order snapshot returned by `GET /orders/{orderId}` and published on
/// the event bus.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub investor_id: i64,
    pub asset_id: i64,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub status: OrderStatus,
    pub idempotency_key: Option<String>,
    pub ordered_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            investor_id: order.investor_id,
            asset_id: order.asset_id,
            side: order.side,
            quantity: order.quantity,
            price: order.price,
            status: order.status,
            idempotency_key: order.idempotency_key.clone(),
            ordered_at: order.ordered_at,
            executed_at: order.executed_at,
            settled_at: order.settled_at,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self::from(&order)
    }
}

/// `POST /orders/{orderId}/cancel` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: String,
}
