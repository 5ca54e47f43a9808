//! Analytics API handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::analytics::{AnalyticsError, AnalyticsRequest, AnalyticsResponse, Level};

use super::handlers::{AppState, ErrorResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQueryParams {
    /// Window start (RFC 3339)
    pub start_date: String,

    /// Window end (RFC 3339), exclusive
    pub end_date: String,

    /// Offset used for day boundaries on hourly and longer buckets
    pub utc_offset_hours: Option<f64>,

    /// Comma-separated levels; absent or empty means all
    pub levels: Option<String>,
}

impl AnalyticsQueryParams {
    pub fn into_request(self) -> Result<AnalyticsRequest, AnalyticsError> {
        let start = parse_instant("startDate", &self.start_date)?;
        let end = parse_instant("endDate", &self.end_date)?;
        let levels = match self.levels.as_deref() {
            Some(raw) => Level::parse_list(raw)?,
            None => Vec::new(),
        };

        AnalyticsRequest::new(start, end)?
            .with_utc_offset_hours(self.utc_offset_hours.unwrap_or(0.0))
            .map(|request| request.with_levels(levels))
    }
}

fn parse_instant(field: &'static str, value: &str) -> Result<DateTime<Utc>, AnalyticsError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| AnalyticsError::InvalidDate {
            field,
            value: value.to_string(),
        })
}

impl IntoResponse for AnalyticsError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Bucketed event counts for a time window
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsQueryParams>,
) -> Result<Json<AnalyticsResponse>, AnalyticsError> {
    let request = params.into_request().inspect_err(|e| {
        tracing::debug!("Rejected analytics request: {}", e);
    })?;

    let response = state.engine.query(&request).await?;
    Ok(Json(response))
}
