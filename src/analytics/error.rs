use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("endDate ({end}) must be after startDate ({start})")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("invalid {field}: '{value}' is not an RFC 3339 timestamp")]
    InvalidDate { field: &'static str, value: String },
    #[error("utcOffsetHours must be a finite value within +/-24 hours, got {0}")]
    InvalidOffset(f64),
    #[error("unknown level '{0}'")]
    InvalidLevel(String),
    #[error("window would produce {buckets} buckets, limit is {limit}")]
    WindowTooLarge { buckets: i64, limit: i64 },
    #[error("event store query timed out after {0:?}")]
    StoreTimeout(Duration),
    #[error("malformed event store response: {0}")]
    MalformedStoreResponse(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AnalyticsError {
    /// Whether the caller is at fault (bad input or an oversized window)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AnalyticsError::InvalidWindow { .. }
                | AnalyticsError::InvalidDate { .. }
                | AnalyticsError::InvalidOffset(_)
                | AnalyticsError::InvalidLevel(_)
                | AnalyticsError::WindowTooLarge { .. }
        )
    }
}
