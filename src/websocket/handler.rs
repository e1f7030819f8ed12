//! Pushes `OrderUpdated` events to a single investor's WebSocket connection.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;

use crate::services::event_bus::OrderTransitionEvent;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ServerMessage<'a> {
    OrderUpdated { order: &'a crate::models::OrderResponse },
}

pub async fn handle_socket(socket: WebSocket, investor_id: i64, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.event_bus.subscribe(investor_id);

    tracing::info!(investor_id, "websocket connection opened");

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(investor_id, error = %e, "websocket read error");
                        break;
                    }
                    _ => {}
                }
            }

            event = events.recv() => {
                match event {
                    Some(event) => {
                        if send_event(&mut sender, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!(investor_id, "websocket connection closed");
}

async fn send_event(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    event: &OrderTransitionEvent,
) -> Result<(), axum::Error> {
    let msg = ServerMessage::OrderUpdated { order: &event.order };
    let text = serde_json::to_string(&msg).unwrap_or_default();
    sender.send(Message::Text(text)).await
}
