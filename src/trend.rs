//! Bounded trend buffers fed by polling the station snapshot.
//!
//! One station is watched at a time. Selecting another station cancels the
//! previous polling task and clears every buffer before new points arrive;
//! points produced for a superseded selection are dropped by generation.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::aggregator::Aggregator;
use crate::models::{Metric, TrendPoint};

// ---

/// Time-ordered, deduplicated, capped series for one chart.
#[derive(Debug, Clone)]
pub struct TrendBuffer {
    cap: usize,
    points: VecDeque<TrendPoint>,
}

impl TrendBuffer {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            points: VecDeque::with_capacity(cap),
        }
    }

    /// Append a point unless it repeats the last timestamp. Returns whether
    /// the point was kept; the oldest points are evicted past the cap.
    pub fn push(&mut self, point: TrendPoint) -> bool {
        // ---
        if self.points.back().is_some_and(|last| last.time == point.time) {
            return false;
        }
        self.points.push_back(point);
        while self.points.len() > self.cap {
            self.points.pop_front();
        }
        true
    }

    /// Replace the contents with a chronological series, keeping the newest points.
    pub fn seed(&mut self, points: impl IntoIterator<Item = TrendPoint>) {
        self.points.clear();
        for point in points {
            self.push(point);
        }
    }

    pub fn points(&self) -> impl Iterator<Item = &TrendPoint> {
        self.points.iter()
    }
}

/// Trend buffers keyed by series key.
#[derive(Debug, Clone)]
pub struct TrendBuffers {
    cap: usize,
    series: BTreeMap<String, TrendBuffer>,
}

impl TrendBuffers {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            series: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, key: &str, point: TrendPoint) -> bool {
        let cap = self.cap;
        self.series
            .entry(key.to_string())
            .or_insert_with(|| TrendBuffer::new(cap))
            .push(point)
    }

    pub fn seed(&mut self, key: &str, points: impl IntoIterator<Item = TrendPoint>) {
        let cap = self.cap;
        self.series
            .entry(key.to_string())
            .or_insert_with(|| TrendBuffer::new(cap))
            .seed(points);
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }

    fn to_view(&self) -> BTreeMap<String, Vec<TrendPoint>> {
        self.series
            .iter()
            .map(|(key, buffer)| (key.clone(), buffer.points().cloned().collect()))
            .collect()
    }
}

// ---

struct TrendState {
    station_id: Option<i32>,
    generation: u64,
    buffers: TrendBuffers,
}

/// Serialisable copy of the monitor's buffers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendView {
    pub station_id: Option<i32>,
    pub max_points: usize,
    pub series: BTreeMap<String, Vec<TrendPoint>>,
}

pub struct TrendMonitor {
    aggregator: Arc<Aggregator>,
    interval: Duration,
    cap: usize,
    state: Arc<Mutex<TrendState>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TrendMonitor {
    pub fn new(aggregator: Arc<Aggregator>, interval: Duration, cap: usize) -> Self {
        Self {
            aggregator,
            interval,
            cap,
            state: Arc::new(Mutex::new(TrendState {
                station_id: None,
                generation: 0,
                buffers: TrendBuffers::new(cap),
            })),
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Start watching `station_id`, replacing any previous selection.
    ///
    /// Buffers are cleared, seeded from one history window and then fed by
    /// a polling task. A failed seed is logged; polling still starts.
    pub async fn select(&self, station_id: i32) -> TrendView {
        // ---
        let mut task = self.task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.station_id = Some(station_id);
            state.buffers.clear();
            state.generation
        };
        info!("Trend monitor watching station {} (generation {})", station_id, generation);

        match self
            .aggregator
            .history(station_id, self.cap as i64, None)
            .await
        {
            Ok(report) => {
                let mut state = lock(&self.state);
                if state.generation == generation {
                    for metric in report.metrics {
                        state.buffers.seed(&metric.series_key(), metric.history);
                    }
                }
            }
            Err(e) => warn!("Failed to seed trends for station {}: {}", station_id, e),
        }

        *task = Some(tokio::spawn(poll_loop(
            self.aggregator.clone(),
            self.state.clone(),
            station_id,
            generation,
            self.interval,
        )));

        self.view()
    }

    /// Stop polling and drop all buffered points.
    pub async fn stop(&self) {
        // ---
        let mut task = self.task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
        }
        let mut state = lock(&self.state);
        state.generation += 1;
        state.station_id = None;
        state.buffers.clear();
    }

    pub fn view(&self) -> TrendView {
        let state = lock(&self.state);
        TrendView {
            station_id: state.station_id,
            max_points: self.cap,
            series: state.buffers.to_view(),
        }
    }
}

impl Drop for TrendMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

fn lock(state: &Mutex<TrendState>) -> std::sync::MutexGuard<'_, TrendState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

async fn poll_loop(
    aggregator: Arc<Aggregator>,
    state: Arc<Mutex<TrendState>>,
    station_id: i32,
    generation: u64,
    interval: Duration,
) {
    // ---
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match aggregator.snapshot(station_id).await {
            Ok((snapshot, _)) => {
                let added = ingest(&state, generation, &snapshot.metrics);
                debug!("Station {} poll added {} trend points", station_id, added);
            }
            Err(e) => warn!("Polling station {} failed: {}", station_id, e),
        }
    }
}

/// Append one observation per metric. Returns the number of points kept;
/// zero when `generation` is no longer the active selection.
///
/// Series hold individual measurements, like the history they are seeded
/// from, so the raw reading is charted even for daily-summed quantities.
fn ingest(state: &Mutex<TrendState>, generation: u64, metrics: &[Metric]) -> usize {
    // ---
    let mut state = lock(state);
    if state.generation != generation {
        return 0;
    }
    metrics
        .iter()
        .filter(|metric| {
            state.buffers.push(
                &metric.series_key(),
                TrendPoint {
                    time: metric.measured_at,
                    value: metric.raw_value,
                },
            )
        })
        .count()
}
