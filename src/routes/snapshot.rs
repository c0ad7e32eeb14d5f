//! `GET /snapshot?stationId=` – current value of every metric of a station.
//!
//! Served from the aggregator's short-lived cache; the `X-Cache` header says
//! whether the payload was recomputed.

use axum::{
    extract::{Query, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::{debug, info};

use super::{AppState, StationQuery};
use crate::error::{parse_id, AppResult};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/snapshot", get(handler))
}

async fn handler(
    Query(params): Query<StationQuery>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    // ---
    let station_id = parse_id("stationId", params.station_id.as_deref())?;
    info!("GET /snapshot - station {}", station_id);

    let (snapshot, cache) = state.aggregator.snapshot(station_id).await?;
    debug!(
        "GET /snapshot - {} metrics ({})",
        snapshot.count,
        cache.as_str()
    );

    let mut response = Json(snapshot).into_response();
    response
        .headers_mut()
        .insert("x-cache", HeaderValue::from_static(cache.as_str()));
    Ok(response)
}
