//! Records Prometheus metrics for every HTTP request.

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

use crate::metrics;

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    metrics::adjust_http_requests_in_flight(1);
    let response = next.run(request).await;
    metrics::adjust_http_requests_in_flight(-1);

    metrics::record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}
