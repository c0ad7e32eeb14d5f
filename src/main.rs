//! Application entry point for the `agro-dashboard` backend service.
//!
//! This binary wires together the farm monitoring backend:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool over the station store
//! - Building the metric aggregator, weather and recommendation clients and
//!   the trend monitor
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `GEMINI_API_KEY` (optional) – enables generated irrigation recommendations
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the full list.
use std::{env, io::IsTerminal, net::SocketAddr, sync::Arc};

use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

mod aggregator;
mod cache;
mod config;
mod dashboard;
mod error;
mod evapotranspiration;
mod models;
mod quantity;
mod recommendation;
mod repository;
mod routes;
mod trend;
mod weather;

pub use config::Config;

use aggregator::Aggregator;
use cache::ttl_cache;
use quantity::AggregationRules;
use recommendation::{GeminiClient, LanguageModel, Recommender};
use repository::{PgReadingStore, ReadingStore};
use routes::AppState;
use trend::TrendMonitor;
use weather::{WeatherClient, WeatherService};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let masked_url = config::mask_db_url(&cfg.db_url);
    tracing::info!("Attempting to connect to database: {}", masked_url);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database '{}': {}", masked_url, e))?;

    tracing::info!("Successfully connected to database");

    let store: Arc<dyn ReadingStore> = Arc::new(PgReadingStore::new(pool));

    let aggregator = Arc::new(Aggregator::new(
        store.clone(),
        ttl_cache(cfg.snapshot_cache_ttl),
        AggregationRules::default(),
        cfg.snapshot_reading_limit,
    ));

    let weather_client = WeatherClient::new(
        &cfg.weather_api_url,
        &cfg.weather_timezone,
        cfg.upstream_timeout,
    )?;
    let weather = WeatherService::new(weather_client, store.clone(), cfg.default_location);

    let model: Option<Arc<dyn LanguageModel>> = match &cfg.gemini_api_key {
        Some(key) => {
            let client = GeminiClient::new(
                &cfg.gemini_api_url,
                &cfg.gemini_model,
                key,
                cfg.upstream_timeout,
            )?;
            Some(Arc::new(client) as Arc<dyn LanguageModel>)
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, recommendations will use the fallback text");
            None
        }
    };
    let recommender = Recommender::new(model, cfg.default_location.lat);

    let trends = TrendMonitor::new(aggregator.clone(), cfg.poll_interval, cfg.max_trend_points);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.bind_port));

    let state = AppState {
        store,
        aggregator,
        weather: Arc::new(weather),
        recommender: Arc::new(recommender),
        trends: Arc::new(trends),
        config: cfg,
    };

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `AXUM_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else the `AXUM_LOG_LEVEL` env var
///
/// Call once at startup, before any logging macro runs.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        // HTTP client internals stay at info
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper_util=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
