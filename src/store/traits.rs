//! `OrderStore`: the seam between the order workflow and its persistence
//! backend. Each method is one complete, atomically-applied business
//! operation — no `sqlx::Transaction` crosses this boundary — so a fake
//! in-memory implementation can stand in for Postgres in tests without a
//! database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Asset, Holding, Investor, Order, OrderSide, OrderStateLog, OrderStatus};

use super::StoreError;

#[derive(Debug, Clone)]
pub struct NewOrderInput {
    pub investor_id: i64,
    pub asset_id: i64,
    pub side: OrderSide,
    pub quantity: rust_decimal::Decimal,
    pub price: Option<rust_decimal::Decimal>,
}

/// Result of admitting a new order: either it was freshly created, or an
/// idempotency key pointed at a prior order that is returned as-is.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Order),
    Existing(Order),
}

#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub order: Order,
    pub previous_status: OrderStatus,
}

#[derive(Debug, Clone)]
pub struct AdvanceOutcome {
    pub order: Order,
    pub previous_status: OrderStatus,
}

#[derive(Debug, Clone)]
pub struct ValidationInputs {
    pub investor: Option<Investor>,
    pub asset: Option<Asset>,
    pub holding: Option<Holding>,
}

/// Outcome of a settlement attempt; `None` means the order was no longer
/// `Filled` (retroactively rejected or cancelled) and settlement is a no-op.
pub type SettleOutcome = Option<Order>;

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("insufficient holdings at execution time")]
    InsufficientHoldings,
    #[error("{0}")]
    Retryable(String),
}

/// A complete persistence backend for the order workflow. Implemented by
/// `PgStore` (Postgres) and, for tests, `FakeStore` (in-memory).
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(
        &self,
        input: NewOrderInput,
        idempotency_key: Option<String>,
        candidate_id: Uuid,
    ) -> Result<CreateOutcome, StoreError>;

    async fn get_order(&self, order_id: Uuid) -> Result<Order, StoreError>;

    async fn list_orders_for_investor(
        &self,
        investor_id: i64,
        from_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<Order>, StoreError>;

    async fn order_history(&self, order_id: Uuid) -> Result<Vec<OrderStateLog>, StoreError>;

    /// Cancels an order if it is still in a cancellable status. Returns
    /// `StoreError::InvalidState` if it isn't.
    async fn cancel_order(&self, order_id: Uuid, reason: String) -> Result<CancelOutcome, StoreError>;

    /// Transitions an order from `expected` to `to`, validating the legality
    /// of the move. Returns `Ok(None)` (no error) if the order was
    /// concurrently cancelled; any other observed status is an `Internal`
    /// error surfaced to the caller.
    async fn advance(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        to: OrderStatus,
        reason: Option<String>,
    ) -> Result<Option<AdvanceOutcome>, StoreError>;

    async fn validation_inputs(
        &self,
        investor_id: i64,
        asset_id: i64,
    ) -> Result<ValidationInputs, StoreError>;

    /// `Executing -> Filled`: trade creation and holdings mutation as one
    /// unit. `order` is expected to already be in `Executing`.
    async fn execute(&self, order: &Order) -> Result<Order, ExecuteError>;

    async fn settle(&self, order_id: Uuid) -> Result<SettleOutcome, StoreError>;

    async fn list_pending_settlement(&self) -> Result<Vec<Order>, StoreError>;
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for std::sync::Arc<T> {
    async fn create_order(
        &self,
        input: NewOrderInput,
        idempotency_key: Option<String>,
        candidate_id: Uuid,
    ) -> Result<CreateOutcome, StoreError> {
        (**self).create_order(input, idempotency_key, candidate_id).await
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Order, StoreError> {
        (**self).get_order(order_id).await
    }

    async fn list_orders_for_investor(
        &self,
        investor_id: i64,
        from_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<Order>, StoreError> {
        (**self).list_orders_for_investor(investor_id, from_date).await
    }

    async fn order_history(&self, order_id: Uuid) -> Result<Vec<OrderStateLog>, StoreError> {
        (**self).order_history(order_id).await
    }

    async fn cancel_order(&self, order_id: Uuid, reason: String) -> Result<CancelOutcome, StoreError> {
        (**self).cancel_order(order_id, reason).await
    }

    async fn advance(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        to: OrderStatus,
        reason: Option<String>,
    ) -> Result<Option<AdvanceOutcome>, StoreError> {
        (**self).advance(order_id, expected, to, reason).await
    }

    async fn validation_inputs(
        &self,
        investor_id: i64,
        asset_id: i64,
    ) -> Result<ValidationInputs, StoreError> {
        (**self).validation_inputs(investor_id, asset_id).await
    }

    async fn execute(&self, order: &Order) -> Result<Order, ExecuteError> {
        (**self).execute(order).await
    }

    async fn settle(&self, order_id: Uuid) -> Result<SettleOutcome, StoreError> {
        (**self).settle(order_id).await
    }

    async fn list_pending_settlement(&self) -> Result<Vec<Order>, StoreError> {
        (**self).list_pending_settlement().await
    }
}
