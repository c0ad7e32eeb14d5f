//! Trend monitor control.
//!
//! - `PUT /trends/station/{stationId}` – watch a station (replaces the previous one)
//! - `GET /trends` – buffered series
//! - `DELETE /trends` – stop watching and clear

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::info;

use super::AppState;
use crate::error::{parse_id, AppResult};
use crate::trend::TrendView;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/trends/station/{station_id}", put(select))
        .route("/trends", get(view).delete(stop))
}

async fn select(
    Path(station_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<TrendView>> {
    // ---
    let station_id = parse_id("stationId", Some(&station_id))?;
    info!("PUT /trends/station/{}", station_id);
    Ok(Json(state.trends.select(station_id).await))
}

async fn view(State(state): State<AppState>) -> Json<TrendView> {
    Json(state.trends.view())
}

async fn stop(State(state): State<AppState>) -> StatusCode {
    // ---
    info!("DELETE /trends");
    state.trends.stop().await;
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    // ---
    use std::sync::Arc;

    use axum::response::IntoResponse;

    use super::*;
    use crate::routes::test_support::{state, store};

    #[tokio::test]
    async fn test_select_seeds_and_stop_clears() {
        // ---
        let state = state(Arc::new(store()));

        let Json(selected) = select(Path("1".to_string()), State(state.clone()))
            .await
            .unwrap();
        assert_eq!(selected.station_id, Some(1));
        assert_eq!(selected.series["5:airTemperature"].len(), 2);

        assert_eq!(stop(State(state.clone())).await, StatusCode::NO_CONTENT);

        let Json(after) = view(State(state)).await;
        assert_eq!(after.station_id, None);
        assert!(after.series.is_empty());
    }

    #[tokio::test]
    async fn test_select_rejects_non_numeric_station() {
        // ---
        let response = select(Path("north".to_string()), State(state(Arc::new(store()))))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
