//! Weather forecast for a station, from the Open-Meteo API.
//!
//! The dashboard must always get a forecast. Live forecasts are cached per
//! location for half an hour; when the upstream fails the last live forecast
//! for that location is served, and only without one the fixed placeholder
//! flagged as `fallback`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Offset, Timelike, Utc,
};
use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::ttl_cache;
use crate::repository::ReadingStore;

// ---

pub const FALLBACK_MESSAGE: &str = "Usando dados de fallback";

/// Live forecasts are reused for this long before the API is asked again.
pub const FORECAST_TTL: Duration = Duration::from_secs(30 * 60);

/// How long a live forecast may stand in for a failed upstream call.
pub const LAST_GOOD_TTL: Duration = Duration::from_secs(6 * 60 * 60);

const HOURLY_STEP: usize = 3;
const HOURLY_ENTRIES: usize = 8;
const FORECAST_DAYS: u32 = 5;
const WEEKDAYS_PT: [&str; 7] = ["Dom", "Seg", "Ter", "Qua", "Qui", "Sex", "Sáb"];

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("weather API answered {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WeatherIcon {
    Sun,
    CloudSun,
    Cloudy,
    CloudRain,
}

impl WeatherIcon {
    /// Icon for a WMO weather interpretation code.
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => WeatherIcon::Sun,
            1 | 2 => WeatherIcon::CloudSun,
            51..=57 | 61..=67 | 80..=82 | 95..=99 => WeatherIcon::CloudRain,
            _ => WeatherIcon::Cloudy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyForecast {
    pub time: String,
    pub temp: i32,
    pub icon: WeatherIcon,
    pub precipitation: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    pub day: String,
    pub max_temp: i32,
    pub min_temp: i32,
    pub icon: WeatherIcon,
    pub precipitation: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    /// Cache key; positions closer than ~10 m share a forecast.
    fn cache_key(&self) -> String {
        format!("{:.4},{:.4}", self.lat, self.lon)
    }
}

/// Hourly and daily series of one live forecast.
pub type Forecast = (Vec<HourlyForecast>, Vec<DailyForecast>);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub twenty_four_hours: Vec<HourlyForecast>,
    pub five_days: Vec<DailyForecast>,
    pub location: Location,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WeatherReport {
    fn live(location: Location, forecast: &Forecast) -> Self {
        WeatherReport {
            twenty_four_hours: forecast.0.clone(),
            five_days: forecast.1.clone(),
            location,
            fallback: false,
            error: None,
        }
    }

    /// Fixed placeholder used whenever the live forecast is unavailable.
    pub fn fallback(location: Location) -> Self {
        // ---
        let hourly = [
            ("09:00", 25, WeatherIcon::CloudSun, 10),
            ("12:00", 28, WeatherIcon::Sun, 5),
            ("15:00", 30, WeatherIcon::Sun, 5),
            ("18:00", 27, WeatherIcon::CloudSun, 15),
            ("21:00", 24, WeatherIcon::Cloudy, 20),
            ("00:00", 22, WeatherIcon::Cloudy, 25),
            ("03:00", 21, WeatherIcon::Cloudy, 30),
            ("06:00", 20, WeatherIcon::CloudSun, 20),
        ];
        let daily = [
            ("Hoje", 30, 20, WeatherIcon::Sun, 10),
            ("Amanhã", 28, 19, WeatherIcon::CloudSun, 25),
            ("Qua", 27, 18, WeatherIcon::CloudRain, 60),
            ("Qui", 29, 19, WeatherIcon::Cloudy, 35),
            ("Sex", 31, 20, WeatherIcon::Sun, 5),
        ];

        WeatherReport {
            twenty_four_hours: hourly
                .into_iter()
                .map(|(time, temp, icon, precipitation)| HourlyForecast {
                    time: time.to_string(),
                    temp,
                    icon,
                    precipitation,
                })
                .collect(),
            five_days: daily
                .into_iter()
                .map(|(day, max_temp, min_temp, icon, precipitation)| DailyForecast {
                    day: day.to_string(),
                    max_temp,
                    min_temp,
                    icon,
                    precipitation,
                })
                .collect(),
            location,
            fallback: true,
            error: Some(FALLBACK_MESSAGE.to_string()),
        }
    }
}

// ---

/// Subset of the Open-Meteo forecast response we consume.
#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    #[serde(default)]
    utc_offset_seconds: i32,
    hourly: OpenMeteoHourly,
    daily: OpenMeteoDaily,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<i32>>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoDaily {
    time: Vec<String>,
    #[serde(default)]
    weather_code: Vec<Option<i32>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
}

fn at<T: Copy>(values: &[Option<T>], index: usize) -> Option<T> {
    values.get(index).copied().flatten()
}

fn round_i32(value: f64) -> i32 {
    value.round() as i32
}

/// Turn the raw response into the dashboard's hourly and daily series.
///
/// Hourly entries start at the current hour in the forecast's own timezone
/// and step every three hours; rows without a temperature are skipped.
fn build_forecast(
    raw: &OpenMeteoResponse,
    now: DateTime<Utc>,
) -> (Vec<HourlyForecast>, Vec<DailyForecast>) {
    // ---
    let offset = FixedOffset::east_opt(raw.utc_offset_seconds).unwrap_or(Utc.fix());
    let current_hour = now.with_timezone(&offset).hour() as usize;

    let hourly = (0..HOURLY_STEP * HOURLY_ENTRIES)
        .step_by(HOURLY_STEP)
        .map(|step| current_hour + step)
        .filter(|&idx| idx < raw.hourly.time.len())
        .filter_map(|idx| {
            let temp = at(&raw.hourly.temperature_2m, idx)?;
            let label = &raw.hourly.time[idx];
            let time = NaiveDateTime::parse_from_str(label, "%Y-%m-%dT%H:%M")
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|_| label.clone());
            Some(HourlyForecast {
                time,
                temp: round_i32(temp),
                icon: at(&raw.hourly.weather_code, idx)
                    .map_or(WeatherIcon::Cloudy, WeatherIcon::from_wmo_code),
                precipitation: at(&raw.hourly.precipitation_probability, idx).map_or(0, round_i32),
            })
        })
        .collect();

    let daily = raw
        .daily
        .time
        .iter()
        .enumerate()
        .filter_map(|(idx, date)| {
            let max = at(&raw.daily.temperature_2m_max, idx)?;
            let min = at(&raw.daily.temperature_2m_min, idx)?;
            Some(DailyForecast {
                day: day_label(idx, date),
                max_temp: round_i32(max),
                min_temp: round_i32(min),
                icon: at(&raw.daily.weather_code, idx)
                    .map_or(WeatherIcon::Cloudy, WeatherIcon::from_wmo_code),
                precipitation: at(&raw.daily.precipitation_probability_max, idx)
                    .map_or(0, round_i32),
            })
        })
        .collect();

    (hourly, daily)
}

fn day_label(index: usize, date: &str) -> String {
    match index {
        0 => "Hoje".to_string(),
        1 => "Amanhã".to_string(),
        _ => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|d| WEEKDAYS_PT[d.weekday().num_days_from_sunday() as usize].to_string())
            .unwrap_or_else(|_| date.to_string()),
    }
}

// ---

/// HTTP client for the forecast API.
#[derive(Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
    timezone: String,
}

impl WeatherClient {
    pub fn new(base_url: &str, timezone: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            timezone: timezone.to_string(),
        })
    }

    pub async fn forecast(&self, location: Location) -> Result<Forecast, WeatherError> {
        // ---
        debug!("Fetching forecast for {:?}", location);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", location.lat.to_string()),
                ("longitude", location.lon.to_string()),
                (
                    "hourly",
                    "temperature_2m,precipitation_probability,weather_code".to_string(),
                ),
                (
                    "daily",
                    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max"
                        .to_string(),
                ),
                ("timezone", self.timezone.clone()),
                ("forecast_days", FORECAST_DAYS.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WeatherError::Status(response.status()));
        }

        let raw: OpenMeteoResponse = response.json().await?;
        Ok(build_forecast(&raw, Utc::now()))
    }
}

/// Resolves station locations and wraps the client with the cache and
/// fallback policy.
pub struct WeatherService {
    client: WeatherClient,
    store: Arc<dyn ReadingStore>,
    default_location: Location,
    fresh: Cache<String, Arc<Forecast>>,
    last_good: Cache<String, Arc<Forecast>>,
}

impl WeatherService {
    pub fn new(client: WeatherClient, store: Arc<dyn ReadingStore>, default_location: Location) -> Self {
        Self {
            client,
            store,
            default_location,
            fresh: ttl_cache(FORECAST_TTL),
            last_good: ttl_cache(LAST_GOOD_TTL),
        }
    }

    /// Forecast for a station. `None` (a non-numeric id) goes straight to the fallback.
    pub async fn report(&self, station_id: Option<i32>) -> WeatherReport {
        // ---
        let Some(station_id) = station_id else {
            return WeatherReport::fallback(self.default_location);
        };

        let location = match self.store.station_position(station_id).await {
            Ok(Some(pos)) => Location {
                lat: pos.latitude,
                lon: pos.longitude,
            },
            Ok(None) => self.default_location,
            Err(e) => {
                warn!("Station {} location lookup failed: {}", station_id, e);
                return WeatherReport::fallback(self.default_location);
            }
        };

        let key = location.cache_key();
        if let Some(forecast) = self.fresh.get(&key).await {
            debug!("Forecast cache HIT for station {} ({})", station_id, key);
            return WeatherReport::live(location, &forecast);
        }

        match self.client.forecast(location).await {
            Ok(forecast) => {
                let forecast = Arc::new(forecast);
                self.fresh.insert(key.clone(), forecast.clone()).await;
                self.last_good.insert(key, forecast.clone()).await;
                WeatherReport::live(location, &forecast)
            }
            Err(e) => match self.last_good.get(&key).await {
                Some(forecast) => {
                    warn!(
                        "Forecast for station {} unavailable, serving last live forecast: {}",
                        station_id, e
                    );
                    WeatherReport::live(location, &forecast)
                }
                None => {
                    warn!("Forecast for station {} unavailable: {}", station_id, e);
                    WeatherReport::fallback(location)
                }
            },
        }
    }
}
