//! Deferred `Filled -> Settled` transitions.
//!
//! Pending jobs are held in an in-memory timer wheel, but the durability
//! contract is the store — on startup, `recover` rebuilds the timer wheel by
//! scanning `Filled` orders with no `settled_at`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::metrics;
use crate::models::{OrderResponse, OrderStatus};
use crate::services::event_bus::{EventBus, OrderTransitionEvent};
use crate::store::{OrderStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Maintains pending `Filled -> Settled` jobs. In-memory timer wheel,
/// reconstructible from the store on startup — see `recover`.
pub struct SettlementScheduler<S: OrderStore> {
    store: S,
    event_bus: Arc<EventBus>,
    delay: Duration,
    /// Tracks outstanding jobs so `pending_count` and tests can observe
    /// scheduler state; the actual timer is a spawned `tokio::time::sleep`.
    pending: DashMap<Uuid, DateTime<Utc>>,
}

impl<S: OrderStore + Clone + 'static> SettlementScheduler<S> {
    pub fn new(store: S, event_bus: Arc<EventBus>, delay_secs: u64) -> Arc<Self> {
        Arc::new(Self {
            store,
            event_bus,
            delay: Duration::seconds(delay_secs as i64),
            pending: DashMap::new(),
        })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Places a deferred job for `order_id`, due at `due_at`. Spawns its own
    /// timer task; settlement jobs are independent and may run concurrently
    /// across distinct orders.
    pub fn schedule(self: &Arc<Self>, order_id: Uuid, due_at: DateTime<Utc>) {
        self.pending.insert(order_id, due_at);
        metrics::set_settlement_jobs_pending(self.pending_count() as i64);
        let this = self.clone();
        tokio::spawn(async move {
            let wait = (due_at - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO);
            tokio::time::sleep(wait).await;
            if let Err(e) = this.settle(order_id).await {
                tracing::error!(%order_id, error = %e, "settlement job failed");
            }
            this.pending.remove(&order_id);
            metrics::set_settlement_jobs_pending(this.pending_count() as i64);
        });
    }

    /// On startup, reconstructs pending jobs by scanning orders in `Filled`
    /// without a `settled_at`. This is the durability contract; the timer
    /// wheel itself is process-local.
    pub async fn recover(self: &Arc<Self>) -> Result<usize, SettlementError> {
        let candidates = self.store.list_pending_settlement().await?;
        let count = candidates.len();

        for order in candidates {
            let due_at = order.executed_at.unwrap_or_else(Utc::now) + self.delay;
            self.schedule(order.id, due_at);
        }

        if count > 0 {
            tracing::info!(count, "recovered pending settlement jobs");
        }
        Ok(count)
    }

    /// Re-reads the order and transitions to `Settled` iff it is still
    /// `Filled`; otherwise a silent no-op (it was retroactively rejected or
    /// cancelled by something outside the core).
    async fn settle(&self, order_id: Uuid) -> Result<(), SettlementError> {
        let Some(updated) = self.store.settle(order_id).await? else {
            tracing::debug!(%order_id, "settlement no-op, order no longer Filled");
            return Ok(());
        };

        metrics::record_transition(&OrderStatus::Filled.to_string(), &OrderStatus::Settled.to_string());
        metrics::record_settlement_processed();
        self.event_bus.publish(
            updated.investor_id,
            OrderTransitionEvent {
                order_id,
                previous_status: Some(OrderStatus::Filled),
                new_status: OrderStatus::Settled,
                order: OrderResponse::from(&updated),
            },
        );

        Ok(())
    }
}
