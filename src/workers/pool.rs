//! Fixed-size worker pool draining a bounded work queue of order ids.
//!
//! Load is bounded by the queue capacity and the number of workers, and a
//! full queue is observable back-pressure instead of an unbounded pile of
//! spawned tasks.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::services::engine::workflow::OrderEngine;
use crate::store::OrderStore;

pub const QUEUE_CAPACITY: usize = 1024;

pub fn work_channel() -> (mpsc::Sender<Uuid>, mpsc::Receiver<Uuid>) {
    mpsc::channel(QUEUE_CAPACITY)
}

/// Spawns `worker_count` tasks, all draining the same receiver. Each order id
/// popped is processed by `OrderEngine::process_order`, which takes its own
/// per-order lock, so concurrent workers never race on the same order.
pub fn spawn_worker_pool<S: OrderStore + Clone + 'static>(
    engine: Arc<OrderEngine<S>>,
    mut receiver: mpsc::Receiver<Uuid>,
    worker_count: usize,
) {
    // mpsc::Receiver has no clone; share it behind a mutex so every worker
    // task can pull from the same queue.
    let receiver = Arc::new(tokio::sync::Mutex::new(std::mem::replace(
        &mut receiver,
        mpsc::channel(1).1,
    )));

    for worker_id in 0..worker_count {
        let engine = engine.clone();
        let receiver = receiver.clone();
        tokio::spawn(async move {
            tracing::info!(worker_id, "workflow worker started");
            loop {
                let order_id = {
                    let mut rx = receiver.lock().await;
                    rx.recv().await
                };
                match order_id {
                    Some(order_id) => {
                        if let Err(e) = engine.process_order(order_id).await {
                            tracing::error!(%order_id, worker_id, error = %e, "workflow processing failed");
                        }
                    }
                    None => {
                        tracing::warn!(worker_id, "work queue closed, worker stopping");
                        break;
                    }
                }
            }
        });
    }
}
