//! Metric aggregation over a station's sensors.
//!
//! Two modes share the same grouping: readings of one sensor are grouped by
//! quantity type and every (sensor, quantity) pair becomes one metric.
//! - snapshot: the current value per pair, cached for a short TTL
//! - history: a chronological window per pair with min/max/avg

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use moka::future::Cache;
use serde::Serialize;
use tracing::debug;

use crate::models::{
    round2, Metric, MetricDescriptor, MetricHistory, QuantityType, Reading, Sensor, TrendPoint,
};
use crate::quantity::{
    display_name_for, icon_for, metric_key_for, Aggregation, AggregationRules, Icon, MetricKey,
    RainLevel,
};
use crate::repository::ReadingStore;

// ---

/// Upper bound accepted for the history window.
pub const MAX_HISTORY_LIMIT: i64 = 5000;

pub const NO_SENSORS_MESSAGE: &str = "No sensors found for this station";
pub const NO_READINGS_MESSAGE: &str = "No readings found for this station";

/// Current metrics of one station.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    // ---
    pub station_id: i32,
    pub metrics: Vec<Metric>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Windowed history of one station.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryReport {
    // ---
    pub station_id: i32,
    pub metrics: Vec<MetricHistory>,
    pub count: usize,
    pub limit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

pub struct Aggregator {
    store: Arc<dyn ReadingStore>,
    cache: Cache<i32, Snapshot>,
    rules: AggregationRules,
    snapshot_limit: i64,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn ReadingStore>,
        cache: Cache<i32, Snapshot>,
        rules: AggregationRules,
        snapshot_limit: i64,
    ) -> Self {
        Self {
            store,
            cache,
            rules,
            snapshot_limit,
        }
    }

    /// Current metrics of a station, served from the cache when fresh.
    ///
    /// Store failures are returned as-is and nothing is cached for them.
    pub async fn snapshot(&self, station_id: i32) -> Result<(Snapshot, CacheStatus), sqlx::Error> {
        // ---
        if let Some(cached) = self.cache.get(&station_id).await {
            debug!("Snapshot cache hit for station {}", station_id);
            return Ok((cached, CacheStatus::Hit));
        }

        let snapshot = self.compute_snapshot(station_id, Utc::now()).await?;
        self.cache.insert(station_id, snapshot.clone()).await;
        Ok((snapshot, CacheStatus::Miss))
    }

    async fn compute_snapshot(
        &self,
        station_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Snapshot, sqlx::Error> {
        // ---
        let sensors = self.store.sensors(station_id).await?;
        if sensors.is_empty() {
            return Ok(Snapshot::empty(station_id, NO_SENSORS_MESSAGE, now));
        }

        let quantities = self.quantity_index().await?;
        let mut metrics = Vec::new();

        for sensor in &sensors {
            let rows = self
                .store
                .recent_readings(sensor.id, None, self.snapshot_limit)
                .await?;
            debug!("Sensor {} returned {} readings", sensor.id, rows.len());

            for (quantity_id, latest) in latest_per_quantity(&rows) {
                let Some(quantity) = quantities.get(&quantity_id) else {
                    debug!("Skipping unknown quantity {} on sensor {}", quantity_id, sensor.id);
                    continue;
                };

                let value = match self.rules.for_quantity(quantity_id) {
                    Aggregation::Latest => latest.value,
                    Aggregation::DailySum => {
                        let (from, to) = local_day_bounds(now);
                        self.store
                            .sum_readings(sensor.id, quantity_id, from, to)
                            .await?
                    }
                };

                metrics.push(build_metric(quantity, sensor, latest, value));
            }
        }

        metrics.sort_by_key(|m| (m.sensor_id, m.descriptor.quantity_id));

        let message = metrics.is_empty().then(|| NO_READINGS_MESSAGE.to_string());
        Ok(Snapshot {
            station_id,
            count: metrics.len(),
            metrics,
            message,
            timestamp: now,
        })
    }

    /// History window of up to `limit` readings per sensor, optionally for one sensor.
    pub async fn history(
        &self,
        station_id: i32,
        limit: i64,
        sensor_id: Option<i32>,
    ) -> Result<HistoryReport, sqlx::Error> {
        // ---
        let now = Utc::now();
        let sensors: Vec<Sensor> = self
            .store
            .sensors(station_id)
            .await?
            .into_iter()
            .filter(|s| sensor_id.map_or(true, |id| s.id == id))
            .collect();

        if sensors.is_empty() {
            return Ok(HistoryReport {
                station_id,
                metrics: Vec::new(),
                count: 0,
                limit,
                message: Some(NO_SENSORS_MESSAGE.to_string()),
                timestamp: now,
            });
        }

        let quantities = self.quantity_index().await?;
        let mut metrics = Vec::new();

        for sensor in &sensors {
            let rows = self.store.recent_readings(sensor.id, None, limit).await?;

            for (quantity_id, group) in group_by_quantity(rows) {
                let Some(quantity) = quantities.get(&quantity_id) else {
                    continue;
                };
                if let Some(history) = build_history(quantity, sensor, group) {
                    metrics.push(history);
                }
            }
        }

        metrics.sort_by_key(|m| (m.sensor_id, m.descriptor.quantity_id));

        let message = metrics.is_empty().then(|| NO_READINGS_MESSAGE.to_string());
        Ok(HistoryReport {
            station_id,
            count: metrics.len(),
            metrics,
            limit,
            message,
            timestamp: now,
        })
    }

    async fn quantity_index(&self) -> Result<HashMap<i32, QuantityType>, sqlx::Error> {
        Ok(self
            .store
            .quantity_types()
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect())
    }
}

impl Snapshot {
    fn empty(station_id: i32, message: &str, now: DateTime<Utc>) -> Self {
        Self {
            station_id,
            metrics: Vec::new(),
            count: 0,
            message: Some(message.to_string()),
            timestamp: now,
        }
    }
}

// ---

/// Latest reading per quantity. On equal timestamps the row seen first wins,
/// which for the newest-first store query is the row with the highest id.
fn latest_per_quantity(rows: &[Reading]) -> BTreeMap<i32, &Reading> {
    // ---
    let mut latest: BTreeMap<i32, &Reading> = BTreeMap::new();
    for row in rows {
        latest
            .entry(row.quantity_id)
            .and_modify(|current| {
                if row.measured_at > current.measured_at {
                    *current = row;
                }
            })
            .or_insert(row);
    }
    latest
}

/// Group rows by quantity, keeping fetch order inside each group.
fn group_by_quantity(rows: Vec<Reading>) -> BTreeMap<i32, Vec<Reading>> {
    let mut groups: BTreeMap<i32, Vec<Reading>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.quantity_id).or_default().push(row);
    }
    groups
}

fn descriptor_for(quantity: &QuantityType) -> MetricDescriptor {
    // ---
    let metric_key = metric_key_for(quantity);
    let unit = quantity.unit.clone().unwrap_or_default();

    let icon = match icon_for(&metric_key) {
        Icon::Gauge => icon_for(quantity.description.as_deref().unwrap_or("")),
        icon => icon,
    };

    MetricDescriptor {
        quantity_id: quantity.id,
        name: display_name_for(quantity),
        short_code: quantity.short_code.clone(),
        metric_key,
        unit,
        icon,
    }
}

fn build_metric(quantity: &QuantityType, sensor: &Sensor, latest: &Reading, value: f64) -> Metric {
    // ---
    let descriptor = descriptor_for(quantity);
    let rain_level = (MetricKey::from_quantity_id(quantity.id) == Some(MetricKey::RainDetection))
        .then(|| RainLevel::from_raw(latest.value));

    Metric {
        descriptor,
        sensor_id: sensor.id,
        sensor_name: sensor.name.clone(),
        value,
        raw_value: latest.value,
        measured_at: latest.measured_at,
        rain_level,
    }
}

/// Summarise one (sensor, quantity) window. `None` for an empty group.
fn build_history(
    quantity: &QuantityType,
    sensor: &Sensor,
    group: Vec<Reading>,
) -> Option<MetricHistory> {
    // ---
    let (min, max, sum) = group.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(min, max, sum), r| (min.min(r.value), max.max(r.value), sum + r.value),
    );
    let count = group.len();

    // Chronological; on equal timestamps the first row fetched ends up last
    let mut ordered: Vec<(usize, Reading)> = group.into_iter().enumerate().collect();
    ordered.sort_by_key(|(idx, r)| (r.measured_at, Reverse(*idx)));

    let current = ordered.last()?.1.value;
    let avg = round2(sum / count as f64);

    let history = ordered
        .iter()
        .map(|(_, r)| TrendPoint {
            time: r.measured_at,
            value: r.value,
        })
        .collect();

    Some(MetricHistory {
        descriptor: descriptor_for(quantity),
        sensor_id: sensor.id,
        sensor_name: sensor.name.clone(),
        history,
        current,
        min,
        max,
        avg,
    })
}

/// Start and end (exclusive) of the local calendar day containing `now`.
pub fn local_day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    // ---
    let today = now.with_timezone(&Local).date_naive();
    let tomorrow = today.succ_opt().unwrap_or(NaiveDate::MAX);
    (local_midnight(today), local_midnight(tomorrow))
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        // Midnight skipped by a DST jump
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}
