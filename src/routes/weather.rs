//! `GET /weather?stationId=` – 24-hour and 5-day forecast for a station.
//!
//! Always answers 200 once a station id is present: any upstream trouble is
//! turned into the fallback payload by [`WeatherService`].
//!
//! [`WeatherService`]: crate::weather::WeatherService

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::info;

use super::{AppState, StationQuery};
use crate::error::{AppError, AppResult};
use crate::weather::WeatherReport;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/weather", get(handler))
}

async fn handler(
    Query(params): Query<StationQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<WeatherReport>> {
    // ---
    let raw = params
        .station_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("stationId is required".to_string()))?;
    info!("GET /weather - station {}", raw);

    let report = state.weather.report(raw.parse::<i32>().ok()).await;
    Ok(Json(report))
}
