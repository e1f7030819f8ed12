//! Postgres-backed `OrderStore`. Each method opens its own transaction,
//! mirroring the low-level `store::{orders,trades,holdings,...}` calls the
//! order workflow used to make directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Order, OrderStateLog, OrderStatus, ReservationOutcome};
use crate::services::engine::state_machine::{self, can_cancel};
use crate::services::holdings;

use super::traits::{
    AdvanceOutcome, CancelOutcome, CreateOutcome, ExecuteError, NewOrderInput, OrderStore,
    SettleOutcome, ValidationInputs,
};
use super::{assets, idempotency, investors, orders, state_log, trades, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(
        &self,
        input: NewOrderInput,
        idempotency_key: Option<String>,
        candidate_id: Uuid,
    ) -> Result<CreateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let outcome = match idempotency_key.as_deref() {
            Some(key) => idempotency::reserve(&mut tx, key, candidate_id).await?,
            None => ReservationOutcome::Created,
        };

        match outcome {
            ReservationOutcome::Existing(existing_id) => {
                tx.commit().await?;
                let order = orders::get(&self.pool, existing_id).await?;
                Ok(CreateOutcome::Existing(order))
            }
            ReservationOutcome::Created => {
                let new_order = orders::insert(
                    &mut *tx,
                    orders::NewOrder {
                        investor_id: input.investor_id,
                        asset_id: input.asset_id,
                        side: input.side,
                        quantity: input.quantity,
                        price: input.price,
                        idempotency_key,
                    },
                )
                .await?;

                state_log::append(&mut tx, new_order.id, None, OrderStatus::New, None, "engine").await?;
                tx.commit().await?;

                Ok(CreateOutcome::Created(new_order))
            }
        }
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Order, StoreError> {
        orders::get(&self.pool, order_id).await
    }

    async fn list_orders_for_investor(
        &self,
        investor_id: i64,
        from_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<Order>, StoreError> {
        orders::list_for_investor(&self.pool, investor_id, from_date).await
    }

    async fn order_history(&self, order_id: Uuid) -> Result<Vec<OrderStateLog>, StoreError> {
        state_log::history(&self.pool, order_id).await
    }

    async fn cancel_order(&self, order_id: Uuid, reason: String) -> Result<CancelOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::get_for_update(&mut tx, order_id).await?;

        if !can_cancel(order.status) {
            return Err(StoreError::InvalidState(format!(
                "cannot cancel order in status {}",
                order.status
            )));
        }

        let updated = orders::update_status(&mut tx, order_id, OrderStatus::Cancelled, None, None).await?;
        state_log::append(&mut tx, order_id, Some(order.status), OrderStatus::Cancelled, Some(reason), "engine")
            .await?;
        tx.commit().await?;

        Ok(CancelOutcome {
            order: updated,
            previous_status: order.status,
        })
    }

    async fn advance(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        to: OrderStatus,
        reason: Option<String>,
    ) -> Result<Option<AdvanceOutcome>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let current = orders::get_for_update(&mut tx, order_id).await?;

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

        let executed_at = matches!(to, OrderStatus::Filled).then(Utc::now);
        let updated = orders::update_status(&mut tx, order_id, to, executed_at, None).await?;
        state_log::append(&mut tx, order_id, Some(expected), to, reason, "engine").await?;
        tx.commit().await?;

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
        let investor = investors::get(&self.pool, investor_id).await?;
        let asset = assets::get(&self.pool, asset_id).await?;
        let holding = super::holdings::get(&self.pool, investor_id, asset_id).await?;

        Ok(ValidationInputs {
            investor,
            asset,
            holding,
        })
    }

    async fn execute(&self, order: &Order) -> Result<Order, ExecuteError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ExecuteError::Retryable(StoreError::from(e).to_string()))?;

        let locked = orders::get_for_update(&mut tx, order.id)
            .await
            .map_err(|e| ExecuteError::Retryable(e.to_string()))?;
        if locked.status != OrderStatus::Executing {
            return Err(ExecuteError::Retryable(format!(
                "order {} expected Executing, found {}",
                order.id, locked.status
            )));
        }

        let execution_price = match order.price {
            Some(p) => p,
            None => {
                let asset = assets::get(&mut *tx, order.asset_id)
                    .await
                    .map_err(|e| ExecuteError::Retryable(e.to_string()))?
                    .ok_or_else(|| ExecuteError::Retryable("asset disappeared before execution".into()))?;
                asset.current_price
            }
        };

        let mutation = match order.side {
            crate::models::OrderSide::Buy => {
                holdings::apply_buy(&mut tx, order.investor_id, order.asset_id, order.quantity, execution_price)
                    .await
                    .map(|_| ())
            }
            crate::models::OrderSide::Sell => {
                holdings::apply_sell(&mut tx, order.investor_id, order.asset_id, order.quantity)
                    .await
                    .map(|_| ())
            }
        };

        if let Err(e) = mutation {
            return Err(match e {
                holdings::HoldingsError::InsufficientHoldings => ExecuteError::InsufficientHoldings,
                holdings::HoldingsError::Store(store_err) => ExecuteError::Retryable(store_err.to_string()),
            });
        }

        trades::insert(
            &mut *tx,
            order.id,
            order.investor_id,
            order.asset_id,
            order.side,
            order.quantity,
            execution_price,
        )
        .await
        .map_err(|e| ExecuteError::Retryable(e.to_string()))?;

        let filled = orders::update_status(&mut tx, order.id, OrderStatus::Filled, Some(Utc::now()), None)
            .await
            .map_err(|e| ExecuteError::Retryable(e.to_string()))?;
        state_log::append(&mut tx, order.id, Some(OrderStatus::Executing), OrderStatus::Filled, None, "engine")
            .await
            .map_err(|e| ExecuteError::Retryable(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| ExecuteError::Retryable(StoreError::from(e).to_string()))?;

        Ok(filled)
    }

    async fn settle(&self, order_id: Uuid) -> Result<SettleOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::get_for_update(&mut tx, order_id).await?;
        if order.status != OrderStatus::Filled {
            return Ok(None);
        }

        let settled_at = Utc::now();
        let updated = orders::update_status(&mut tx, order_id, OrderStatus::Settled, None, Some(settled_at)).await?;
        state_log::append(&mut tx, order_id, Some(OrderStatus::Filled), OrderStatus::Settled, None, "settlement")
            .await?;
        tx.commit().await?;

        Ok(Some(updated))
    }

    async fn list_pending_settlement(&self) -> Result<Vec<Order>, StoreError> {
        orders::list_pending_settlement(&self.pool).await
    }
}
