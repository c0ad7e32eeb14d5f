//! `GET /metrics?stationId=&limit=&sensorId=` – history window per metric.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::AppState;
use crate::aggregator::HistoryReport;
use crate::error::{parse_id, parse_limit, parse_optional_id, AppResult};

// ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    station_id: Option<String>,
    limit: Option<String>,
    sensor_id: Option<String>,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/metrics", get(handler))
}

async fn handler(
    Query(params): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<HistoryReport>> {
    // ---
    let station_id = parse_id("stationId", params.station_id.as_deref())?;
    let sensor_id = parse_optional_id("sensorId", params.sensor_id.as_deref())?;
    let limit = parse_limit(params.limit.as_deref(), state.config.history_default_limit)?;
    info!(
        "GET /metrics - station {} limit {} sensor {:?}",
        station_id, limit, sensor_id
    );

    let report = state
        .aggregator
        .history(station_id, limit, sensor_id)
        .await?;
    debug!("GET /metrics - returning {} series", report.count);
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    // ---
    use std::sync::Arc;

    use axum::{http::StatusCode, response::IntoResponse};

    use super::*;
    use crate::routes::test_support::{body_json, state, store};

    fn query(station_id: &str, limit: Option<&str>, sensor_id: Option<&str>) -> Query<HistoryQuery> {
        Query(HistoryQuery {
            station_id: Some(station_id.to_string()),
            limit: limit.map(str::to_string),
            sensor_id: sensor_id.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_history_window() {
        // ---
        let state = state(Arc::new(store()));

        let Json(report) = handler(query("1", Some("1"), None), State(state.clone()))
            .await
            .unwrap();
        assert_eq!(report.limit, 1);
        assert_eq!(report.count, 1);
        assert_eq!(report.metrics[0].history.len(), 1);
        assert_eq!(report.metrics[0].current, 25.456);

        let Json(other) = handler(query("1", None, Some("99")), State(state))
            .await
            .unwrap();
        assert_eq!(other.limit, 100);
        assert!(other.metrics.is_empty());
    }

    #[tokio::test]
    async fn test_history_rejects_out_of_range_limit() {
        // ---
        let response = handler(query("1", Some("9000"), None), State(state(Arc::new(store()))))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_history_store_failure_is_retryable() {
        // ---
        let store = Arc::new(store());
        store.set_failing(true);

        let response = handler(query("1", None, None), State(state(store)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "STORE_UNAVAILABLE");
        assert_eq!(body["error"]["retryable"], true);
    }
}
