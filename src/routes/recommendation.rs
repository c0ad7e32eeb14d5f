//! `POST /recommendation` – irrigation advice from a crop's latest readings.
//!
//! Evapotranspiration is estimated from the temperature when the caller does
//! not send one.

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::recommendation::{IrrigationInput, Recommendation};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/recommendation", post(handler))
}

/// Handle `POST /recommendation`.
///
/// Only a malformed input is an error; an unavailable backend still answers
/// 200 with the fallback text.
async fn handler(
    State(state): State<AppState>,
    Json(input): Json<IrrigationInput>,
) -> AppResult<Json<Recommendation>> {
    // ---
    input.validate().map_err(AppError::Validation)?;
    info!(
        "POST /recommendation - crop {} soil moisture {}%",
        input.crop_type, input.soil_moisture
    );

    Ok(Json(state.recommender.recommend(input).await))
}

#[cfg(test)]
mod tests {
    // ---
    use std::sync::Arc;

    use axum::{http::StatusCode, response::IntoResponse};

    use super::*;
    use crate::recommendation::FALLBACK_RECOMMENDATION;
    use crate::routes::test_support::{state, store};

    fn input(soil_moisture: f64) -> IrrigationInput {
        IrrigationInput {
            soil_moisture,
            crop_type: "Milho".to_string(),
            air_temperature: Some(20.0),
            air_humidity: None,
            wind_speed: None,
            luminosity: None,
            evapotranspiration: None,
            latitude: None,
            temp_min: None,
            temp_max: None,
        }
    }

    #[tokio::test]
    async fn test_recommendation_without_backend_is_fallback() {
        // ---
        let Json(result) = handler(State(state(Arc::new(store()))), Json(input(35.0)))
            .await
            .unwrap();
        assert!(result.fallback);
        assert_eq!(result.recommendation, FALLBACK_RECOMMENDATION);
        assert!(result.calculated_et.is_some());
    }

    #[tokio::test]
    async fn test_recommendation_rejects_invalid_moisture() {
        // ---
        let response = handler(State(state(Arc::new(store()))), Json(input(140.0)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
