//! Read-only catalog endpoints over the station store, plus the dashboard tree.
//!
//! Thin pass-throughs: parameters are validated here and every row comes
//! straight from [`ReadingStore`](crate::repository::ReadingStore).

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::{AppState, StationQuery};
use crate::dashboard::{build_tree, PropertyNode};
use crate::error::{parse_id, parse_limit, parse_optional_id, AppResult};
use crate::models::{Crop, Property, QuantityType, Reading, Sensor, Station, StationPosition};

// ---

const DEFAULT_READINGS_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SensorQuery {
    sensor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadingsQuery {
    sensor_id: Option<String>,
    quantity_id: Option<String>,
    limit: Option<String>,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/db/properties", get(properties))
        .route("/db/crops", get(crops))
        .route("/db/stations", get(stations))
        .route("/db/station-positions", get(station_positions))
        .route("/db/quantities", get(quantities))
        .route("/db/sensors", get(sensors))
        .route("/db/latest-reading", get(latest_reading))
        .route("/db/readings", get(readings))
        .route("/dashboard", get(dashboard))
}

async fn properties(State(state): State<AppState>) -> AppResult<Json<Vec<Property>>> {
    info!("GET /db/properties");
    Ok(Json(state.store.properties().await?))
}

async fn crops(State(state): State<AppState>) -> AppResult<Json<Vec<Crop>>> {
    info!("GET /db/crops");
    Ok(Json(state.store.crops().await?))
}

async fn stations(State(state): State<AppState>) -> AppResult<Json<Vec<Station>>> {
    info!("GET /db/stations");
    Ok(Json(state.store.stations().await?))
}

async fn station_positions(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<StationPosition>>> {
    info!("GET /db/station-positions");
    Ok(Json(state.store.station_positions().await?))
}

async fn quantities(State(state): State<AppState>) -> AppResult<Json<Vec<QuantityType>>> {
    info!("GET /db/quantities");
    Ok(Json(state.store.quantity_types().await?))
}

async fn sensors(
    Query(params): Query<StationQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Sensor>>> {
    // ---
    let station_id = parse_id("stationId", params.station_id.as_deref())?;
    info!("GET /db/sensors - station {}", station_id);
    Ok(Json(state.store.sensors(station_id).await?))
}

async fn latest_reading(
    Query(params): Query<SensorQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<Option<Reading>>> {
    // ---
    let sensor_id = parse_id("sensorId", params.sensor_id.as_deref())?;
    info!("GET /db/latest-reading - sensor {}", sensor_id);
    Ok(Json(state.store.latest_reading(sensor_id).await?))
}

async fn readings(
    Query(params): Query<ReadingsQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Reading>>> {
    // ---
    let sensor_id = parse_id("sensorId", params.sensor_id.as_deref())?;
    let quantity_id = parse_optional_id("quantityId", params.quantity_id.as_deref())?;
    let limit = parse_limit(params.limit.as_deref(), DEFAULT_READINGS_LIMIT)?;
    info!(
        "GET /db/readings - sensor {} quantity {:?} limit {}",
        sensor_id, quantity_id, limit
    );

    let rows = state
        .store
        .recent_readings(sensor_id, quantity_id, limit)
        .await?;
    debug!("GET /db/readings - returning {} rows", rows.len());
    Ok(Json(rows))
}

async fn dashboard(State(state): State<AppState>) -> AppResult<Json<Vec<PropertyNode>>> {
    // ---
    info!("GET /dashboard");
    let (properties, crops, stations, positions) = tokio::try_join!(
        state.store.properties(),
        state.store.crops(),
        state.store.stations(),
        state.store.station_positions(),
    )?;

    let tree = build_tree(&properties, &crops, &stations, &positions);
    debug!("GET /dashboard - {} properties", tree.len());
    Ok(Json(tree))
}
