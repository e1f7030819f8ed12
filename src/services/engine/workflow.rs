//! `OrderEngine`: owns the order lifecycle, orchestrates validation,
//! execution and the state log via an `OrderStore`, and hands filled orders
//! to the settlement scheduler.
//!
//! Generic over the store backend so the same workflow logic runs against
//! Postgres in production and an in-memory fake in tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::metrics;
use crate::models::{CreateOrderRequest, Order, OrderResponse, OrderStateLog, OrderStatus};
use crate::services::event_bus::{EventBus, OrderTransitionEvent};
use crate::services::settlement::SettlementScheduler;
use crate::services::validator;
use crate::store::traits::{ExecuteError, NewOrderInput};
use crate::store::{CreateOutcome, OrderStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("order {0} not found")]
    NotFound(Uuid),
    #[error("{0}")]
    InvalidState(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => EngineError::Internal("order disappeared mid-transaction".into()),
            StoreError::InvalidState(msg) => EngineError::InvalidState(msg),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

pub struct OrderEngine<S: OrderStore> {
    store: S,
    event_bus: Arc<EventBus>,
    settlement: Arc<SettlementScheduler<S>>,
    work_tx: mpsc::Sender<Uuid>,
    /// Per-order single-flight lock: at most one worker processes a given
    /// order at a time.
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl<S: OrderStore + Clone + 'static> OrderEngine<S> {
    pub fn new(
        store: S,
        event_bus: Arc<EventBus>,
        settlement: Arc<SettlementScheduler<S>>,
        work_tx: mpsc::Sender<Uuid>,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            store,
            event_bus,
            settlement,
            work_tx,
            locks: DashMap::new(),
            max_retries,
            retry_backoff,
        }
    }

    fn order_lock(&self, order_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(order_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn publish(&self, order: &Order, previous: Option<OrderStatus>) {
        self.event_bus.publish(
            order.investor_id,
            OrderTransitionEvent {
                order_id: order.id,
                previous_status: previous,
                new_status: order.status,
                order: OrderResponse::from(order),
            },
        );
    }

    /// `CreateOrder(request, key?)`. Synchronous: returns only once the `New`
    /// record (or the prior order for a duplicate key) is durably committed.
    /// Enqueues workflow processing for a freshly created order.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        idempotency_key: Option<String>,
    ) -> Result<Order, EngineError> {
        let candidate_id = Uuid::new_v4();

        let input = NewOrderInput {
            investor_id: request.investor_id,
            asset_id: request.asset_id,
            side: request.side,
            quantity: request.quantity,
            price: request.price,
        };

        let outcome = self.store.create_order(input, idempotency_key.clone(), candidate_id).await?;

        let order = match outcome {
            CreateOutcome::Existing(existing) => {
                if let Some(ref key) = idempotency_key {
                    tracing::warn!(%key, order_id = %existing.id, "idempotency key reused; returning prior order, payload not re-checked");
                }
                existing
            }
            CreateOutcome::Created(new_order) => {
                metrics::record_order_created(&new_order.side.to_string());
                self.publish(&new_order, None);

                if self.work_tx.send(new_order.id).await.is_err() {
                    tracing::error!(order_id = %new_order.id, "work queue closed; order will not progress until recovered");
                }

                new_order
            }
        };

        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, EngineError> {
        self.store.get_order(order_id).await.map_err(|e| match e {
            StoreError::NotFound(_) => EngineError::NotFound(order_id),
            other => other.into(),
        })
    }

    pub async fn list_orders_for_investor(
        &self,
        investor_id: i64,
        from_date: Option<chrono::DateTime<Utc>>,
    ) -> Result<Vec<Order>, EngineError> {
        Ok(self.store.list_orders_for_investor(investor_id, from_date).await?)
    }

    pub async fn order_history(&self, order_id: Uuid) -> Result<Vec<OrderStateLog>, EngineError> {
        Ok(self.store.order_history(order_id).await?)
    }

    /// `CancelOrder(orderId, reason)`. Accepted only from `{New, Validated}`.
    pub async fn cancel_order(&self, order_id: Uuid, reason: String) -> Result<Order, EngineError> {
        let _guard = self.order_lock(order_id).lock().await;

        let outcome = self.store.cancel_order(order_id, reason).await.map_err(|e| match e {
            StoreError::NotFound(_) => EngineError::NotFound(order_id),
            other => other.into(),
        })?;

        metrics::record_transition(&outcome.previous_status.to_string(), &OrderStatus::Cancelled.to_string());
        metrics::record_order_cancelled();
        self.publish(&outcome.order, Some(outcome.previous_status));
        Ok(outcome.order)
    }

    /// Drives one order through `Validating -> {Rejected | Validated ->
    /// Executing -> {Filled | Rejected}}`. Settlement is handed off to the
    /// scheduler once the order reaches `Filled`.
    pub async fn process_order(&self, order_id: Uuid) -> Result<(), EngineError> {
        let _guard = self.order_lock(order_id).lock().await;

        let Some(order) = self.advance(order_id, OrderStatus::New, OrderStatus::Validating, None).await? else {
            return Ok(());
        };

        let validation = self.run_validator(&order).await;

        match validation {
            Ok(()) => {
                if self
                    .advance(order_id, OrderStatus::Validating, OrderStatus::Validated, None)
                    .await?
                    .is_none()
                {
                    return Ok(());
                }
            }
            Err(reason) => {
                self.advance(order_id, OrderStatus::Validating, OrderStatus::Rejected, Some(reason)).await?;
                return Ok(());
            }
        }

        let Some(order) = self.advance(order_id, OrderStatus::Validated, OrderStatus::Executing, None).await? else {
            return Ok(());
        };

        match self.execute_with_retries(&order).await {
            Ok(filled) => {
                let due_at = filled.executed_at.unwrap_or_else(Utc::now) + self.settlement.delay();
                self.settlement.schedule(filled.id, due_at);
            }
            Err(detail) => {
                self.advance(order_id, OrderStatus::Executing, OrderStatus::Rejected, Some(format!("System error: {detail}"))).await?;
            }
        }

        Ok(())
    }

    /// Transitions an order from `expected` to `to` via the store, logging
    /// metrics and publishing the event on success. Returns `None` (no error,
    /// no event) if the order was concurrently cancelled.
    async fn advance(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        to: OrderStatus,
        reason: Option<String>,
    ) -> Result<Option<Order>, EngineError> {
        let Some(outcome) = self.store.advance(order_id, expected, to, reason).await? else {
            return Ok(None);
        };

        metrics::record_transition(&outcome.previous_status.to_string(), &to.to_string());
        if to == OrderStatus::Rejected {
            metrics::record_order_rejected();
        }
        self.publish(&outcome.order, Some(outcome.previous_status));
        Ok(Some(outcome.order))
    }

    async fn run_validator(&self, order: &Order) -> Result<(), String> {
        let inputs = self
            .store
            .validation_inputs(order.investor_id, order.asset_id)
            .await
            .map_err(|e| e.to_string())?;

        validator::validate(order, inputs.investor.as_ref(), inputs.asset.as_ref(), inputs.holding.as_ref())
            .map_err(|e| e.0)
    }

    /// `Executing -> Filled`: trade creation and holdings mutation in one
    /// transaction. Retries transient store failures with bounded backoff;
    /// `InsufficientHoldings` is a definitive business outcome and is never
    /// retried.
    async fn execute_with_retries(&self, order: &Order) -> Result<Order, String> {
        let mut attempt = 0;
        loop {
            match self.store.execute(order).await {
                Ok(filled) => {
                    metrics::record_transition(&OrderStatus::Executing.to_string(), &OrderStatus::Filled.to_string());
                    self.publish(&filled, Some(OrderStatus::Executing));
                    return Ok(filled);
                }
                Err(ExecuteError::InsufficientHoldings) => {
                    return Err("insufficient holdings at execution time".to_string())
                }
                Err(ExecuteError::Retryable(detail)) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(order_id = %order.id, attempt, %detail, "execution attempt failed, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(ExecuteError::Retryable(detail)) => return Err(detail),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountStatus, Asset, Investor, OrderSide, OrderStatus};
    use crate::services::settlement::SettlementScheduler;
    use crate::workers::pool::work_channel;
    use rust_decimal_macros::dec;
    use std::time::Duration as StdDuration;

    fn test_engine(store: Arc<crate::store::FakeStore>) -> (Arc<OrderEngine<Arc<crate::store::FakeStore>>>, mpsc::Receiver<Uuid>) {
        let event_bus = Arc::new(EventBus::new());
        let settlement = SettlementScheduler::new(store.clone(), event_bus.clone(), 0);
        let (work_tx, work_rx) = work_channel();
        let engine = Arc::new(OrderEngine::new(
            store,
            event_bus,
            settlement,
            work_tx,
            1,
            StdDuration::from_millis(1),
        ));
        (engine, work_rx)
    }

    fn seed(store: &crate::store::FakeStore, investor_id: i64, asset_id: i64, price: rust_decimal::Decimal) {
        store.seed_investor(Investor {
            investor_id,
            account_status: AccountStatus::Active,
        });
        store.seed_asset(Asset {
            asset_id,
            is_active: true,
            current_price: price,
        });
    }

    fn buy_request(investor_id: i64, asset_id: i64, quantity: rust_decimal::Decimal, price: Option<rust_decimal::Decimal>) -> CreateOrderRequest {
        CreateOrderRequest {
            investor_id,
            asset_id,
            side: OrderSide::Buy,
            quantity,
            price,
        }
    }

    /// Full lifecycle: a market buy drives itself from New through Filled
    /// once the workflow worker drains the queue, landing in Executing ->
    /// Filled with the trade and holding recorded.
    #[tokio::test]
    async fn full_lifecycle_reaches_filled() {
        let store = Arc::new(crate::store::FakeStore::new());
        seed(&store, 1, 10, dec!(50.00));
        let (engine, mut work_rx) = test_engine(store.clone());

        let order = engine.create_order(buy_request(1, 10, dec!(2), None), None).await.unwrap();
        assert_eq!(order.status, OrderStatus::New);

        let order_id = work_rx.recv().await.unwrap();
        engine.process_order(order_id).await.unwrap();

        let filled = engine.get_order(order_id).await.unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);
        assert_eq!(store.trade_count(), 1);

        let holding = store.holding(1, 10).unwrap();
        assert_eq!(holding.quantity, dec!(2));
        assert_eq!(holding.average_cost, dec!(50.0000));
    }

    /// A duplicate idempotency key returns the original order and never
    /// enqueues a second workflow run.
    #[tokio::test]
    async fn duplicate_idempotency_key_returns_same_order() {
        let store = Arc::new(crate::store::FakeStore::new());
        seed(&store, 1, 10, dec!(50.00));
        let (engine, mut work_rx) = test_engine(store.clone());

        let first = engine
            .create_order(buy_request(1, 10, dec!(2), None), Some("client-key-1".into()))
            .await
            .unwrap();
        let second = engine
            .create_order(buy_request(1, 10, dec!(2), None), Some("client-key-1".into()))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        // only the first creation enqueues workflow processing
        let enqueued = work_rx.recv().await.unwrap();
        assert_eq!(enqueued, first.id);
        assert!(work_rx.try_recv().is_err());
    }

    /// Two buys on the same (investor, asset) average into a single holding
    /// via weighted-average cost.
    #[tokio::test]
    async fn repeat_buys_average_into_one_holding() {
        let store = Arc::new(crate::store::FakeStore::new());
        seed(&store, 1, 10, dec!(50.00));
        let (engine, mut work_rx) = test_engine(store.clone());

        let first = engine.create_order(buy_request(1, 10, dec!(2), Some(dec!(50.00))), None).await.unwrap();
        let order_id = work_rx.recv().await.unwrap();
        engine.process_order(order_id).await.unwrap();
        assert_eq!(engine.get_order(first.id).await.unwrap().status, OrderStatus::Filled);

        let second = engine.create_order(buy_request(1, 10, dec!(2), Some(dec!(60.00))), None).await.unwrap();
        let order_id = work_rx.recv().await.unwrap();
        engine.process_order(order_id).await.unwrap();
        assert_eq!(engine.get_order(second.id).await.unwrap().status, OrderStatus::Filled);

        let holding = store.holding(1, 10).unwrap();
        assert_eq!(holding.quantity, dec!(4));
        assert_eq!(holding.average_cost, dec!(55.0000));
    }

    /// Cancelling an order racing the workflow worker: whichever wins, the
    /// order ends in a single terminal status, never both Filled and
    /// Cancelled.
    #[tokio::test]
    async fn cancel_racing_worker_is_consistent() {
        let store = Arc::new(crate::store::FakeStore::new());
        seed(&store, 1, 10, dec!(50.00));
        let (engine, mut work_rx) = test_engine(store.clone());

        let order = engine.create_order(buy_request(1, 10, dec!(2), None), None).await.unwrap();
        let order_id = work_rx.recv().await.unwrap();

        // Cancel before the worker ever picks up the order: the New -> New
        // advance should observe Cancelled and abort silently.
        let cancelled = engine.cancel_order(order_id, "investor request".into()).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        engine.process_order(order_id).await.unwrap();

        let final_order = engine.get_order(order.id).await.unwrap();
        assert_eq!(final_order.status, OrderStatus::Cancelled);
    }

    /// Cancelling an order already in a terminal status is rejected.
    #[tokio::test]
    async fn cancel_after_terminal_status_is_rejected() {
        let store = Arc::new(crate::store::FakeStore::new());
        seed(&store, 1, 10, dec!(50.00));
        let (engine, mut work_rx) = test_engine(store.clone());

        let order = engine.create_order(buy_request(1, 10, dec!(2), None), None).await.unwrap();
        let order_id = work_rx.recv().await.unwrap();
        engine.process_order(order_id).await.unwrap();
        assert_eq!(engine.get_order(order.id).await.unwrap().status, OrderStatus::Filled);

        let err = engine.cancel_order(order_id, "too late".into()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }
}
