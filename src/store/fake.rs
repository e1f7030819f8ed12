//! In-memory `OrderStore` for tests. Mirrors `PgStore`'s semantics exactly —
//! same transition/cancellability rules, same holdings arithmetic — so the
//! order workflow can be exercised end-to-end without a database.
//!
//! State lives behind a plain `std::sync::Mutex`: every method body is
//! synchronous `HashMap` manipulation with no `.await` held across the lock.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Asset, Holding, Investor, Order, OrderSide, OrderStateLog, OrderStatus};
use crate::services::engine::state_machine::{self, can_cancel};
use crate::services::holdings::{compute_buy, compute_sell, SellOutcome};

use super::traits::{
    AdvanceOutcome, CancelOutcome, CreateOutcome, ExecuteError, NewOrderInput, OrderStore,
    SettleOutcome, ValidationInputs,
};
use super::StoreError;

#[derive(Default)]
struct FakeState {
    orders: HashMap<Uuid, Order>,
    investors: HashMap<i64, Investor>,
    assets: HashMap<i64, Asset>,
    holdings: HashMap<(i64, i64), Holding>,
    trades: u64,
    state_logs: Vec<OrderStateLog>,
    idempotency: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct FakeStore(Mutex<FakeState>);

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_investor(&self, investor: Investor) {
        self.0.lock().unwrap().investors.insert(investor.investor_id, investor);
    }

    pub fn seed_asset(&self, asset: Asset) {
        self.0.lock().unwrap().assets.insert(asset.asset_id, asset);
    }

    pub fn holding(&self, investor_id: i64, asset_id: i64) -> Option<Holding> {
        self.0.lock().unwrap().holdings.get(&(investor_id, asset_id)).cloned()
    }

    pub fn trade_count(&self) -> u64 {
        self.0.lock().unwrap().trades
    }

    fn log(state: &mut FakeState, order_id: Uuid, from: Option<OrderStatus>, to: OrderStatus, reason: Option<String>, logged_by: &str) {
        state.state_logs.push(OrderStateLog {
            id: Uuid::new_v4(),
            order_id,
            from_status: from,
            to_status: to,
            reason,
            logged_by: logged_by.to_string(),
            logged_at: Utc::now(),
        });
    }
}

#[async_trait]
impl OrderStore for FakeStore {
    async fn create_order(
        &self,
        input: NewOrderInput,
        idempotency_key: Option<String>,
        candidate_id: Uuid,
    ) -> Result<CreateOutcome, StoreError> {
        let mut state = self.0.lock().unwrap();

        if let Some(ref key) = idempotency_key {
            if let Some(existing_id) = state.idempotency.get(key).copied() {
                let order = state
                    .orders
                    .get(&existing_id)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(format!("order {existing_id}")))?;
                return Ok(CreateOutcome::Existing(order));
            }
        }

        let now = Utc::now();
        let order = Order {
            id: candidate_id,
            investor_id: input.investor_id,
            asset_id: input.asset_id,
            side: input.side,
            quantity: input.quantity,
            price: input.price,
            status: OrderStatus::New,
            idempotency_key: idempotency_key.clone(),
            ordered_at: now,
            executed_at: None,
            settled_at: None,
        };

        if let Some(key) = idempotency_key {
            state.idempotency.insert(key, candidate_id);
        }
        state.orders.insert(candidate_id, order.clone());
        Self::log(&mut state, candidate_id, None, OrderStatus::New, None, "engine");

        Ok(CreateOutcome::Created(order))
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Order, StoreError> {
        self.0
            .lock()
            .unwrap()
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))
    }

    async fn list_orders_for_investor(
        &self,
        investor_id: i64,
        from_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<Order>, StoreError> {
        let state = self.0.lock().unwrap();
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.investor_id == investor_id)
            .filter(|o| from_date.map(|d| o.ordered_at >= d).unwrap_or(true))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.ordered_at.cmp(&a.ordered_at));
        Ok(orders)
    }

    async fn order_history(&self, order_id: Uuid) -> Result<Vec<OrderStateLog>, StoreError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .state_logs
            .iter()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn cancel_order(&self, order_id: Uuid, reason: String) -> Result<CancelOutcome, StoreError> {
        let mut state = self.0.lock().unwrap();
        let current = state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;

        if !can_cancel(current.status) {
            return Err(StoreError::InvalidState(format!(
                "cannot cancel order in status {}",
                current.status
            )));
        }

        let mut updated = current.clone();
        updated.status = OrderStatus::Cancelled;
        state.orders.insert(order_id, updated.clone());
        Self::log(&mut state, order_id, Some(current.status), OrderStatus::Cancelled, Some(reason), "engine");

        Ok(CancelOutcome {
            order: updated,
            previous_status: current.status,
        })
    }

    async fn advance(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        to: OrderStatus,
        reason: Option<String>,
    ) -> Result<Option<AdvanceOutcome>, StoreError> {
        let mut state = self.0.lock().unwrap();
        let current = state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;

        if current.status == OrderStatus::Cancelled {
            return Ok(None);
        }
        if current.status != expected {
            return Err(StoreError::Fatal(format!(
                "order {order_id} expected to be {expected}, found {}",
                current.status
            )));
        }

        state_machine::transition(expected, to).map_err(|e| StoreError::Fatal(e.to_string()))?;

        let mut updated = current.clone();
        updated.status = to;
        if matches!(to, OrderStatus::Filled) {
            updated.executed_at = Some(Utc::now());
        }
        state.orders.insert(order_id, updated.clone());
        Self::log(&mut state, order_id, Some(expected), to, reason, "engine");

        Ok(Some(AdvanceOutcome {
            order: updated,
            previous_status: expected,
        }))
    }

    async fn validation_inputs(
        &self,
        investor_id: i64,
        asset_id: i64,
    ) -> Result<ValidationInputs, StoreError> {
        let state = self.0.lock().unwrap();
        Ok(ValidationInputs {
            investor: state.investors.get(&investor_id).cloned(),
            asset: state.assets.get(&asset_id).cloned(),
            holding: state.holdings.get(&(investor_id, asset_id)).cloned(),
        })
    }

    async fn execute(&self, order: &Order) -> Result<Order, ExecuteError> {
        let mut state = self.0.lock().unwrap();

        let locked = state
            .orders
            .get(&order.id)
            .cloned()
            .ok_or_else(|| ExecuteError::Retryable(format!("order {} disappeared", order.id)))?;
        if locked.status != OrderStatus::Executing {
            return Err(ExecuteError::Retryable(format!(
                "order {} expected Executing, found {}",
                order.id, locked.status
            )));
        }

        let execution_price = match order.price {
            Some(p) => p,
            None => {
                state
                    .assets
                    .get(&order.asset_id)
                    .map(|a| a.current_price)
                    .ok_or_else(|| ExecuteError::Retryable("asset disappeared before execution".into()))?
            }
        };

        let key = (order.investor_id, order.asset_id);
        let existing = state.holdings.get(&key).cloned();

        match order.side {
            OrderSide::Buy => {
                let (new_qty, new_avg) = compute_buy(existing.as_ref(), order.quantity, execution_price);
                state.holdings.insert(
                    key,
                    Holding {
                        investor_id: order.investor_id,
                        asset_id: order.asset_id,
                        quantity: new_qty,
                        average_cost: new_avg,
                        updated_at: Utc::now(),
                    },
                );
            }
            OrderSide::Sell => {
                let average_cost = existing.as_ref().map(|h| h.average_cost).unwrap_or_default();
                match compute_sell(existing.as_ref(), order.quantity) {
                    Ok(SellOutcome::Exhausted) => {
                        state.holdings.remove(&key);
                    }
                    Ok(SellOutcome::Remaining(new_qty)) => {
                        state.holdings.insert(
                            key,
                            Holding {
                                investor_id: order.investor_id,
                                asset_id: order.asset_id,
                                quantity: new_qty,
                                average_cost,
                                updated_at: Utc::now(),
                            },
                        );
                    }
                    Err(_) => return Err(ExecuteError::InsufficientHoldings),
                }
            }
        }

        state.trades += 1;

        let mut filled = locked;
        filled.status = OrderStatus::Filled;
        filled.executed_at = Some(Utc::now());
        state.orders.insert(order.id, filled.clone());
        Self::log(&mut state, order.id, Some(OrderStatus::Executing), OrderStatus::Filled, None, "engine");

        Ok(filled)
    }

    async fn settle(&self, order_id: Uuid) -> Result<SettleOutcome, StoreError> {
        let mut state = self.0.lock().unwrap();
        let order = state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;

        if order.status != OrderStatus::Filled {
            return Ok(None);
        }

        let mut updated = order;
        updated.status = OrderStatus::Settled;
        updated.settled_at = Some(Utc::now());
        state.orders.insert(order_id, updated.clone());
        Self::log(&mut state, order_id, Some(OrderStatus::Filled), OrderStatus::Settled, None, "settlement");

        Ok(Some(updated))
    }

    async fn list_pending_settlement(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Filled && o.settled_at.is_none())
            .cloned()
            .collect())
    }
}
