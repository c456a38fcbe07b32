use async_trait::async_trait;
use sqlx::PgPool;

use super::{
    history::HistoryQuery,
    models::{ControlEvent, SensorReading},
    StoreError,
};
use crate::{control::models::ActuatorState, sensors::models::SensorPayload};

/// Durable storage for readings and control events.
///
/// Both tables are append-only; nothing here updates or deletes a row.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_reading(&self, reading: &SensorPayload) -> Result<SensorReading, StoreError>;

    /// Most recently inserted reading, by id.
    async fn latest_reading(&self) -> Result<Option<SensorReading>, StoreError>;

    async fn reading_history(&self, query: &HistoryQuery) -> Result<Vec<SensorReading>, StoreError>;

    async fn insert_control_event(
        &self,
        state: &ActuatorState,
        source: &str,
    ) -> Result<ControlEvent, StoreError>;

    /// Up to `limit` most recent control events, newest first.
    async fn control_history(&self, limit: i64) -> Result<Vec<ControlEvent>, StoreError>;
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_reading(&self, reading: &SensorPayload) -> Result<SensorReading, StoreError> {
        let row = sqlx::query_as::<_, SensorReading>(
            r#"
            INSERT INTO sensor_data (temperature, humidity, light)
            VALUES ($1, $2, $3)
            RETURNING id, temperature, humidity, light, recorded_at
            "#,
        )
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.light)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn latest_reading(&self) -> Result<Option<SensorReading>, StoreError> {
        let row = sqlx::query_as::<_, SensorReading>(
            r#"
            SELECT id, temperature, humidity, light, recorded_at
            FROM sensor_data
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn reading_history(&self, query: &HistoryQuery) -> Result<Vec<SensorReading>, StoreError> {
        let sql = query.to_sql();
        let mut q = sqlx::query_as::<_, SensorReading>(&sql);
        if query.has_search() {
            q = q.bind(query.like_pattern());
        }

        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn insert_control_event(
        &self,
        state: &ActuatorState,
        source: &str,
    ) -> Result<ControlEvent, StoreError> {
        let row = sqlx::query_as::<_, ControlEvent>(
            r#"
            INSERT INTO device_log (led1, led2, led3, source)
            VALUES ($1, $2, $3, $4)
            RETURNING id, led1, led2, led3, source, recorded_at
            "#,
        )
        .bind(state.led1.is_on())
        .bind(state.led2.is_on())
        .bind(state.led3.is_on())
        .bind(source)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn control_history(&self, limit: i64) -> Result<Vec<ControlEvent>, StoreError> {
        let rows = sqlx::query_as::<_, ControlEvent>(
            r#"
            SELECT id, led1, led2, led3, source, recorded_at
            FROM device_log
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests (need a live Postgres: DATABASE_URL=... cargo test -- --ignored)
// ---------------------------------------------------------------------------
