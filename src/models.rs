//! Data models for the farm monitoring dashboard.
//!
//! Row types mirror the read queries issued against the station store;
//! derived types (`Metric`, `MetricHistory`, `TrendPoint`) are rebuilt on
//! every aggregation pass and never persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::quantity::{Icon, RainLevel};

// ---

/// A farm property.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    // ---
    pub id: i32,
    pub name: String,
}

/// A crop grown on a property.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Crop {
    // ---
    pub id: i32,
    pub name: String,
    pub property_id: i32,
}

/// A monitoring station.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    // ---
    pub id: i32,
    pub property_id: i32,
    pub name: String,
    pub description: Option<String>,
}

/// Most recent position assignment of a station to a crop.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StationPosition {
    // ---
    pub id: i32,
    pub station_id: i32,
    pub crop_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub registered_at: Option<DateTime<Utc>>,
}

/// A sensor mounted on a station.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    // ---
    pub id: i32,
    pub name: String,
    pub station_id: i32,
}

/// Reference entry describing a physical quantity ("grandeza").
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuantityType {
    // ---
    pub id: i32,
    pub short_code: String,
    pub unit: Option<String>,
    pub description: Option<String>,
}

/// One individual measurement. Append-only in the store.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    // ---
    pub id: i64,
    pub sensor_id: i32,
    pub quantity_id: i32,
    pub value: f64,
    pub measured_at: DateTime<Utc>,
}

/// A single chart point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    // ---
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// Display descriptor carried by every metric. Always complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDescriptor {
    // ---
    pub quantity_id: i32,
    pub metric_key: String,
    pub name: String,
    pub short_code: String,
    pub unit: String,
    pub icon: Icon,
}

/// Current value of one (sensor, quantity) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    // ---
    #[serde(flatten)]
    pub descriptor: MetricDescriptor,
    pub sensor_id: i32,
    pub sensor_name: String,
    /// Value shown as current; the daily total for summed quantities.
    pub value: f64,
    /// The latest raw reading, whatever the aggregation strategy.
    pub raw_value: f64,
    pub measured_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rain_level: Option<RainLevel>,
}

/// Windowed history of one (sensor, quantity) pair, oldest point first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricHistory {
    // ---
    #[serde(flatten)]
    pub descriptor: MetricDescriptor,
    pub sensor_id: i32,
    pub sensor_name: String,
    pub history: Vec<TrendPoint>,
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Key identifying one chart series: a metric as reported by one sensor.
pub fn series_key(sensor_id: i32, metric_key: &str) -> String {
    format!("{sensor_id}:{metric_key}")
}

impl Metric {
    pub fn series_key(&self) -> String {
        series_key(self.sensor_id, &self.descriptor.metric_key)
    }
}

impl MetricHistory {
    pub fn series_key(&self) -> String {
        series_key(self.sensor_id, &self.descriptor.metric_key)
    }
}

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
