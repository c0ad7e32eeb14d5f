//! End-to-end checks against a running instance.
//!
//! Start the service (with a reachable `DATABASE_URL`) and point `BASE_URL`
//! at it. `STATION_ID` selects a station known to have sensors (default 1).

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    station_id: i32,
    metrics: Vec<Metric>,
    count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Metric {
    sensor_id: i32,
    metric_key: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryReport {
    metrics: Vec<MetricHistory>,
    limit: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricHistory {
    history: Vec<TrendPoint>,
    min: f64,
    max: f64,
    avg: f64,
}

#[derive(Debug, Deserialize)]
struct TrendPoint {
    time: chrono::DateTime<chrono::Utc>,
}

fn base_url() -> String {
    std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into())
}

fn station_id() -> String {
    std::env::var("STATION_ID").unwrap_or_else(|_| "1".into())
}

#[tokio::test]
async fn health_is_ok() -> Result<()> {
    // ---
    let body: Value = Client::new()
        .get(format!("{}/health", base_url()))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn snapshot_has_one_metric_per_sensor_and_key() -> Result<()> {
    // ---
    let url = format!("{}/snapshot?stationId={}", base_url(), station_id());
    let response = Client::new().get(&url).send().await?;

    assert_eq!(response.status(), StatusCode::OK);
    let cache = response
        .headers()
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert!(matches!(cache.as_deref(), Some("HIT") | Some("MISS")));

    let snapshot: Snapshot = response.json().await?;
    assert_eq!(snapshot.station_id.to_string(), station_id());
    assert_eq!(snapshot.count, snapshot.metrics.len());

    let mut keys: Vec<(i32, &str)> = snapshot
        .metrics
        .iter()
        .map(|m| (m.sensor_id, m.metric_key.as_str()))
        .collect();
    let total = keys.len();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), total, "duplicate (sensor, metric) pairs in {url}");
    assert!(snapshot.metrics.iter().all(|m| m.value.is_finite()));

    Ok(())
}

#[tokio::test]
async fn history_is_chronological_with_consistent_stats() -> Result<()> {
    // ---
    let url = format!("{}/metrics?stationId={}&limit=50", base_url(), station_id());
    let report: HistoryReport = Client::new().get(&url).send().await?.json().await?;

    assert_eq!(report.limit, 50);
    for metric in &report.metrics {
        assert!(!metric.history.is_empty());
        assert!(metric.history.len() <= 50);
        assert!(metric.history.windows(2).all(|w| w[0].time <= w[1].time));
        assert!(metric.min <= metric.avg && metric.avg <= metric.max);
    }

    Ok(())
}

#[tokio::test]
async fn invalid_parameters_are_rejected() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();

    for path in [
        "/snapshot".to_string(),
        "/snapshot?stationId=north".to_string(),
        format!("/metrics?stationId={}&limit=0", station_id()),
        format!("/metrics?stationId={}&limit=5001", station_id()),
        "/weather".to_string(),
    ] {
        let response = client.get(format!("{base}{path}")).send().await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "GET {path}");

        let body: Value = response.json().await?;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["retryable"], false);
    }

    Ok(())
}

#[tokio::test]
async fn weather_always_answers_with_a_forecast() -> Result<()> {
    // ---
    let client = Client::new();

    // A non-numeric id is answered with the fallback payload, never an error
    let url = format!("{}/weather?stationId=abc", base_url());
    let fallback: Value = client.get(&url).send().await?.json().await?;
    assert_eq!(fallback["fallback"], true);
    assert_eq!(fallback["error"], "Usando dados de fallback");

    let url = format!("{}/weather?stationId={}", base_url(), station_id());
    let live: Value = client.get(&url).send().await?.json().await?;
    assert!(live["twentyFourHours"].as_array().is_some_and(|h| h.len() <= 8));
    assert!(live["fiveDays"].as_array().is_some_and(|d| d.len() <= 5));

    Ok(())
}

#[tokio::test]
async fn recommendation_reports_computed_et() -> Result<()> {
    // ---
    let url = format!("{}/recommendation", base_url());
    let body: Value = Client::new()
        .post(&url)
        .json(&serde_json::json!({
            "soilMoisture": 22.0,
            "airTemperature": 20.0,
            "cropType": "Soja",
            "latitude": -15.78,
        }))
        .send()
        .await?
        .json()
        .await?;

    assert!(body["recommendation"]
        .as_str()
        .is_some_and(|r| r.starts_with("Recomendação:")));
    assert!(body["calculatedET"].as_f64().is_some_and(|et| et > 0.0));

    Ok(())
}
