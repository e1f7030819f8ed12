use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CancelOrderRequest, CreateOrderRequest, CreateOrderResponse, OrderResponse};
use crate::AppState;

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// `POST /orders`
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    if req.quantity <= rust_decimal::Decimal::ZERO {
        return Err(AppError::BadRequest("quantity must be positive".into()));
    }

    let key = idempotency_key(&headers);
    let order = state.engine.create_order(req, key).await?;
    Ok((StatusCode::ACCEPTED, Json(CreateOrderResponse::from(&order))))
}

/// `GET /orders/{orderId}`
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.engine.get_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(rename = "fromDate")]
    from_date: Option<DateTime<Utc>>,
}

/// `GET /orders/investor/{investorId}`
pub async fn list_orders_for_investor(
    State(state): State<Arc<AppState>>,
    Path(investor_id): Path<i64>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state
        .engine
        .list_orders_for_investor(investor_id, query.from_date)
        .await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

#[derive(Debug, Serialize)]
pub struct CancelOrderResponse {
    message: String,
}

/// `POST /orders/{orderId}/cancel`
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<CancelOrderResponse>, AppError> {
    state.engine.cancel_order(order_id, req.reason).await?;
    Ok(Json(CancelOrderResponse {
        message: "order cancelled".to_string(),
    }))
}
