//! Read-only query layer over the station store.
//!
//! [`ReadingStore`] is the seam every consumer depends on; [`PgReadingStore`]
//! is the PostgreSQL implementation. All queries bind their parameters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{Crop, Property, QuantityType, Reading, Sensor, Station, StationPosition};

// ---

#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn properties(&self) -> Result<Vec<Property>, sqlx::Error>;

    async fn crops(&self) -> Result<Vec<Crop>, sqlx::Error>;

    async fn stations(&self) -> Result<Vec<Station>, sqlx::Error>;

    /// Most recent position assignment of every station.
    async fn station_positions(&self) -> Result<Vec<StationPosition>, sqlx::Error>;

    /// Most recent position assignment of one station, if any.
    async fn station_position(
        &self,
        station_id: i32,
    ) -> Result<Option<StationPosition>, sqlx::Error>;

    async fn quantity_types(&self) -> Result<Vec<QuantityType>, sqlx::Error>;

    async fn sensors(&self, station_id: i32) -> Result<Vec<Sensor>, sqlx::Error>;

    async fn latest_reading(&self, sensor_id: i32) -> Result<Option<Reading>, sqlx::Error>;

    /// Up to `limit` readings of a sensor, newest first, optionally for one quantity.
    async fn recent_readings(
        &self,
        sensor_id: i32,
        quantity_id: Option<i32>,
        limit: i64,
    ) -> Result<Vec<Reading>, sqlx::Error>;

    /// Sum of the values measured in `[from, to)`; zero when there are none.
    async fn sum_readings(
        &self,
        sensor_id: i32,
        quantity_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64, sqlx::Error>;
}

// ---

/// [`ReadingStore`] backed by the production PostgreSQL schema.
#[derive(Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const READING_COLUMNS: &str = r#"
    id::int8              AS id,
    id_sensor             AS sensor_id,
    id_grandeza           AS quantity_id,
    valor::float8         AS value,
    ts_medida::timestamptz AS measured_at
"#;

const POSITION_COLUMNS: &str = r#"
    id,
    id_estacao            AS station_id,
    id_cultura            AS crop_id,
    latitude::float8      AS latitude,
    longitude::float8     AS longitude,
    ts_cadastro::timestamptz AS registered_at
"#;

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn properties(&self) -> Result<Vec<Property>, sqlx::Error> {
        sqlx::query_as::<_, Property>(
            "SELECT id, nome_propriedade AS name FROM tab_propriedade ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn crops(&self) -> Result<Vec<Crop>, sqlx::Error> {
        sqlx::query_as::<_, Crop>(
            r#"
            SELECT id, nome_cultura AS name, id_propriedade AS property_id
            FROM tab_cultura
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn stations(&self) -> Result<Vec<Station>, sqlx::Error> {
        sqlx::query_as::<_, Station>(
            r#"
            SELECT id, id_propriedade AS property_id, nome_estacao AS name,
                   descricao_estacao AS description
            FROM tab_estacao
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn station_positions(&self) -> Result<Vec<StationPosition>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT DISTINCT ON (id_estacao) {POSITION_COLUMNS}
            FROM tab_pos_estacao
            ORDER BY id_estacao, ts_cadastro DESC NULLS LAST, id DESC
            "#
        );
        sqlx::query_as::<_, StationPosition>(&sql)
            .fetch_all(&self.pool)
            .await
    }

    async fn station_position(
        &self,
        station_id: i32,
    ) -> Result<Option<StationPosition>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {POSITION_COLUMNS}
            FROM tab_pos_estacao
            WHERE id_estacao = $1
            ORDER BY ts_cadastro DESC NULLS LAST, id DESC
            LIMIT 1
            "#
        );
        sqlx::query_as::<_, StationPosition>(&sql)
            .bind(station_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn quantity_types(&self) -> Result<Vec<QuantityType>, sqlx::Error> {
        sqlx::query_as::<_, QuantityType>(
            r#"
            SELECT id, nome_grandeza AS short_code, unidade_medida AS unit,
                   descricao_grandeza AS description
            FROM tab_grandeza
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn sensors(&self, station_id: i32) -> Result<Vec<Sensor>, sqlx::Error> {
        sqlx::query_as::<_, Sensor>(
            r#"
            SELECT id, nome_sensor AS name, id_estacao AS station_id
            FROM tab_sensor
            WHERE id_estacao = $1
            ORDER BY id
            "#,
        )
        .bind(station_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn latest_reading(&self, sensor_id: i32) -> Result<Option<Reading>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM tab_medida_individual
            WHERE id_sensor = $1
            ORDER BY ts_medida DESC
            LIMIT 1
            "#
        );
        sqlx::query_as::<_, Reading>(&sql)
            .bind(sensor_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn recent_readings(
        &self,
        sensor_id: i32,
        quantity_id: Option<i32>,
        limit: i64,
    ) -> Result<Vec<Reading>, sqlx::Error> {
        // ---
        // `$2 IS NULL` keeps a single statement for both the filtered and unfiltered case
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM tab_medida_individual
            WHERE id_sensor = $1
              AND ($2::int4 IS NULL OR id_grandeza = $2)
            ORDER BY ts_medida DESC, id DESC
            LIMIT $3
            "#
        );
        sqlx::query_as::<_, Reading>(&sql)
            .bind(sensor_id)
            .bind(quantity_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    async fn sum_readings(
        &self,
        sensor_id: i32,
        quantity_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64, sqlx::Error> {
        sqlx::query_scalar::<_, f64>(
            r#"
            SELECT COALESCE(SUM(valor), 0)::float8
            FROM tab_medida_individual
            WHERE id_sensor = $1
              AND id_grandeza = $2
              AND ts_medida::timestamptz >= $3
              AND ts_medida::timestamptz <  $4
            "#,
        )
        .bind(sensor_id)
        .bind(quantity_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
    }
}

// ---
