use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

use crate::websocket::handler::handle_socket;
use crate::AppState;

pub fn create_router(_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new().route("/orders/:investor_id", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(investor_id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, investor_id, state))
}
