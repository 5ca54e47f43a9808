use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::analytics::AnalyticsEngine;

use super::analytics::get_analytics;
use super::handlers::{health_check, AppState};
use super::middleware::log_request_latency;

pub fn create_api_router(engine: Arc<AnalyticsEngine>, cors_allow_any: bool) -> Router {
    let state = Arc::new(AppState { engine });

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/api/analytics", get(get_analytics))
        .layer(middleware::from_fn(log_request_latency))
        .with_state(state);

    if cors_allow_any {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
