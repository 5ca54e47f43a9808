use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::analytics::AnalyticsEngine;

pub struct AppState {
    pub engine: Arc<AnalyticsEngine>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
