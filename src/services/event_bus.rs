//! In-process publication fabric for order state transitions.
//!
//! Subscribers register per `investorId`. Delivery is best-effort: a
//! disconnected or lagging subscriber misses events and must re-read state
//! via `GetOrder`. There is no durable queue and no replay: each investor
//! gets their own channel so one investor's lag never drops another
//! investor's events.

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::models::{OrderResponse, OrderStatus};

#[derive(Debug, Clone)]
pub struct OrderTransitionEvent {
    pub order_id: uuid::Uuid,
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub order: OrderResponse,
}

const SUBSCRIBER_BUFFER: usize = 256;

/// Per-investor fan-out. Each subscriber gets its own bounded mpsc channel so
/// one slow reader cannot block delivery to others; a full channel drops the
/// event for that reader rather than blocking the publisher.
#[derive(Default)]
pub struct EventBus {
    subscribers: DashMap<i64, Vec<mpsc::Sender<OrderTransitionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    pub fn subscribe(&self, investor_id: i64) -> mpsc::Receiver<OrderTransitionEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.entry(investor_id).or_default().push(tx);
        rx
    }

    /// Publishes to every live subscriber for the event's investor. Must be
    /// called only after the owning transaction has committed.
    pub fn publish(&self, investor_id: i64, event: OrderTransitionEvent) {
        if let Some(mut senders) = self.subscribers.get_mut(&investor_id) {
            senders.retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_event(investor_id: i64) -> OrderTransitionEvent {
        OrderTransitionEvent {
            order_id: Uuid::new_v4(),
            previous_status: Some(OrderStatus::New),
            new_status: OrderStatus::Validating,
            order: OrderResponse {
                order_id: Uuid::new_v4(),
                investor_id,
                asset_id: 10,
                side: crate::models::OrderSide::Buy,
                quantity: dec!(2),
                price: None,
                status: OrderStatus::Validating,
                idempotency_key: None,
                ordered_at: Utc::now(),
                executed_at: None,
                settled_at: None,
            },
        }
    }

    #[tokio::test]
    async fn subscriber_receives_only_its_investor_events() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe(1);
        let _rx2 = bus.subscribe(2);

        bus.publish(1, sample_event(1));
        bus.publish(2, sample_event(2));

        let received = rx1.recv().await.unwrap();
        assert_eq!(received.order.investor_id, 1);
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_a_noop() {
        let bus = EventBus::new();
        bus.publish(99, sample_event(99));
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_on_next_publish() {
        let bus = EventBus::new();
        let rx = bus.subscribe(1);
        drop(rx);
        bus.publish(1, sample_event(1));
        assert_eq!(bus.subscribers.get(&1).unwrap().len(), 0);
    }
}
