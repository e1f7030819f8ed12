use std::sync::Arc;

use axum::extract::State;

use crate::AppState;

pub async fn render_metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
