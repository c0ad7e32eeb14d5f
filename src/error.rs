//! Error type shared by the HTTP handlers.
//!
//! Only failures the caller has to act on live here. Weather and
//! recommendation upstream failures are recovered where they happen and
//! never reach this type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::aggregator::MAX_HISTORY_LIMIT;

// ---

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad or missing request parameter. Never worth retrying.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The station store could not be reached or rejected a query.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    retryable: bool,
}

impl AppError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Store(_))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // ---
        let (status, code) = self.status_and_code();
        let message = match &self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Store(_) => "The station store is unavailable, try again".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code,
                message,
                retryable: self.is_retryable(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Parse a required numeric id query parameter.
pub fn parse_id(name: &str, raw: Option<&str>) -> AppResult<i32> {
    // ---
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))?;

    raw.parse::<i32>()
        .map_err(|_| AppError::Validation(format!("{name} must be numeric, got '{raw}'")))
}

/// Parse an optional numeric id query parameter.
pub fn parse_optional_id(name: &str, raw: Option<&str>) -> AppResult<Option<i32>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => parse_id(name, Some(value)).map(Some),
        None => Ok(None),
    }
}

/// Window size, `default` when absent. Must be within `1..=MAX_HISTORY_LIMIT`.
pub fn parse_limit(raw: Option<&str>, default: i64) -> AppResult<i64> {
    // ---
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(default);
    };
    match raw.parse::<i64>() {
        Ok(limit) if (1..=MAX_HISTORY_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(AppError::Validation(format!(
            "limit must be an integer between 1 and {MAX_HISTORY_LIMIT}, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_parse_id() {
        // ---
        assert_eq!(parse_id("stationId", Some("12")).unwrap(), 12);
        assert_eq!(parse_id("stationId", Some(" 7 ")).unwrap(), 7);

        assert!(matches!(
            parse_id("stationId", None),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            parse_id("stationId", Some("st1")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_optional_id() {
        // ---
        assert_eq!(parse_optional_id("sensorId", None).unwrap(), None);
        assert_eq!(parse_optional_id("sensorId", Some("")).unwrap(), None);
        assert_eq!(parse_optional_id("sensorId", Some("3")).unwrap(), Some(3));
        assert!(parse_optional_id("sensorId", Some("x")).is_err());
    }

    #[test]
    fn test_status_mapping() {
        // ---
        let validation = AppError::Validation("bad".into());
        assert_eq!(validation.into_response().status(), StatusCode::BAD_REQUEST);

        let store = AppError::Store(sqlx::Error::PoolTimedOut);
        assert!(store.is_retryable());
        assert_eq!(store.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let internal = AppError::Internal(anyhow::anyhow!("boom"));
        assert!(!internal.is_retryable());
        assert_eq!(
            internal.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_parse_limit() {
        // ---
        assert_eq!(parse_limit(None, 100).unwrap(), 100);
        assert_eq!(parse_limit(Some(" "), 100).unwrap(), 100);
        assert_eq!(parse_limit(Some("1"), 100).unwrap(), 1);
        assert_eq!(parse_limit(Some("5000"), 100).unwrap(), 5000);

        for bad in ["0", "-3", "5001", "ten", "2.5"] {
            assert!(
                matches!(parse_limit(Some(bad), 100), Err(AppError::Validation(_))),
                "limit '{bad}' should be rejected"
            );
        }
    }
}
