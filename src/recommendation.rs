//! Irrigation recommendation via a generative-language backend.
//!
//! The service side of the contract is the input: the latest readings are
//! enriched with a reference evapotranspiration before being rendered into
//! the prompt. Wording is up to the model; failures degrade to a fixed
//! apology so the rest of the dashboard keeps rendering.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::evapotranspiration::{day_of_year, estimate_et, lux_to_solar_radiation};

// ---

pub const RECOMMENDATION_MARKER: &str = "Recomendação:";
pub const FALLBACK_RECOMMENDATION: &str =
    "Recomendação: Não foi possível gerar uma recomendação no momento.";

/// Spread applied around the current temperature when no extremes are known.
const TEMPERATURE_SPREAD: f64 = 5.0;

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("no generative-language API key configured")]
    NotConfigured,

    #[error("generative-language request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generative-language API answered {0}")]
    Status(reqwest::StatusCode),

    #[error("generative-language API returned no text")]
    EmptyResponse,
}

/// Latest readings for one crop, as sent by the dashboard.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationInput {
    // ---
    pub soil_moisture: f64,
    pub crop_type: String,
    pub air_temperature: Option<f64>,
    pub air_humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    /// Illuminance in lux.
    pub luminosity: Option<f64>,
    /// Reference evapotranspiration in mm/day, computed when absent.
    pub evapotranspiration: Option<f64>,
    pub latitude: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
}

impl IrrigationInput {
    pub fn validate(&self) -> Result<(), String> {
        // ---
        if !self.soil_moisture.is_finite() || !(0.0..=100.0).contains(&self.soil_moisture) {
            return Err(format!(
                "soilMoisture must be a percentage between 0 and 100, got {}",
                self.soil_moisture
            ));
        }
        if self.crop_type.trim().is_empty() {
            return Err("cropType is required".to_string());
        }
        Ok(())
    }

    /// Fill in `evapotranspiration` from temperature, latitude and luminosity.
    ///
    /// Left empty when there is no temperature to work from or the supplied
    /// extremes are inverted.
    pub fn enrich(mut self, default_latitude: f64, day_of_year: u32) -> Self {
        // ---
        if self.evapotranspiration.is_some() {
            return self;
        }
        let Some(temp) = self.air_temperature else {
            return self;
        };

        let temp_max = self.temp_max.unwrap_or(temp + TEMPERATURE_SPREAD);
        let temp_min = self.temp_min.unwrap_or(temp - TEMPERATURE_SPREAD);
        let latitude = self.latitude.unwrap_or(default_latitude);
        let radiation = self
            .luminosity
            .filter(|lux| *lux > 0.0)
            .map(lux_to_solar_radiation);

        match estimate_et(temp, temp_max, temp_min, latitude, day_of_year, radiation) {
            Ok(et) => self.evapotranspiration = Some(et),
            Err(e) => warn!("Skipping evapotranspiration estimate: {}", e),
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub recommendation: String,
    #[serde(rename = "calculatedET")]
    pub calculated_et: Option<f64>,
    pub fallback: bool,
}

fn describe(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v}{unit}"),
        None => "não informado".to_string(),
    }
}

/// Prompt sent to the backend for an enriched input.
pub fn render_prompt(input: &IrrigationInput) -> String {
    // ---
    format!(
        r#"You are an expert agronomist specializing in irrigation management.
Provide a clear and concise irrigation recommendation for a {crop} crop based on the following real-time data:

- Soil Moisture: {moisture}%
- Air Temperature: {temperature}
- Air Humidity: {humidity}
- Wind Speed: {wind}
- Luminosity: {luminosity}
- Reference Evapotranspiration (ET0): {et}

Follow these rules:
- If soil moisture is critically low (below 25%), recommend immediate irrigation regardless of evapotranspiration.
- If soil moisture is adequate (above 40-50%) and evapotranspiration is low, recommend holding off on irrigation.
- If soil moisture is borderline and evapotranspiration is high, recommend partial irrigation to compensate the expected loss.

Answer in Brazilian Portuguese, be direct and practical for a farm manager.
Start with "{marker}"

Example: "Recomendação: A umidade do solo está adequada. Nenhuma irrigação é necessária no momento. Monitore novamente em 24 horas."
Example: "Recomendação: Risco de estresse hídrico. Inicie a irrigação com uma lâmina de 5mm para repor a umidade perdida.""#,
        crop = input.crop_type.trim(),
        moisture = input.soil_moisture,
        temperature = describe(input.air_temperature, "°C"),
        humidity = describe(input.air_humidity, "%"),
        wind = describe(input.wind_speed, " km/h"),
        luminosity = describe(input.luminosity, " lux"),
        et = describe(input.evapotranspiration, " mm/day"),
        marker = RECOMMENDATION_MARKER,
    )
}

/// Trim model output and make sure it opens with the marker phrase.
fn normalize(text: &str) -> Option<String> {
    // ---
    let text = text.trim().trim_matches('"').trim();
    if text.is_empty() {
        None
    } else if text.starts_with(RECOMMENDATION_MARKER) {
        Some(text.to_string())
    } else {
        Some(format!("{RECOMMENDATION_MARKER} {text}"))
    }
}

// ---

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, RecommendationError>;
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, RecommendationError> {
        // ---
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RecommendationError::Status(response.status()));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            Err(RecommendationError::EmptyResponse)
        } else {
            Ok(text)
        }
    }
}

/// Enriches inputs and relays them to the configured backend.
pub struct Recommender {
    model: Option<Arc<dyn LanguageModel>>,
    default_latitude: f64,
}

impl Recommender {
    pub fn new(model: Option<Arc<dyn LanguageModel>>, default_latitude: f64) -> Self {
        Self {
            model,
            default_latitude,
        }
    }

    pub async fn recommend(&self, input: IrrigationInput) -> Recommendation {
        // ---
        let today = day_of_year(Local::now().date_naive());
        let input = input.enrich(self.default_latitude, today);
        let calculated_et = input.evapotranspiration;
        debug!("Irrigation input after enrichment: {:?}", input);

        let outcome = match &self.model {
            Some(model) => model.generate(&render_prompt(&input)).await,
            None => Err(RecommendationError::NotConfigured),
        };

        match outcome.map(|text| normalize(&text)) {
            Ok(Some(recommendation)) => Recommendation {
                recommendation,
                calculated_et,
                fallback: false,
            },
            Ok(None) => {
                warn!("Recommendation backend returned blank text");
                Self::fallback(calculated_et)
            }
            Err(e) => {
                warn!("Recommendation unavailable: {}", e);
                Self::fallback(calculated_et)
            }
        }
    }

    fn fallback(calculated_et: Option<f64>) -> Recommendation {
        Recommendation {
            recommendation: FALLBACK_RECOMMENDATION.to_string(),
            calculated_et,
            fallback: true,
        }
    }
}
