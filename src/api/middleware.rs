use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Log method, path, status and latency for every API request
pub async fn log_request_latency(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    tracing::info!(
        "{} {} -> {} in {:?}",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}
