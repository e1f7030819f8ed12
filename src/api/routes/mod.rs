use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::api::handlers;
use crate::AppState;

pub fn create_router(_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(handlers::order::create_order))
        .route("/orders/:order_id", get(handlers::order::get_order))
        .route("/orders/:order_id/cancel", post(handlers::order::cancel_order))
        .route("/orders/investor/:investor_id", get(handlers::order::list_orders_for_investor))
}
