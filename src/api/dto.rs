use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    control::models::{ActuatorState, Switch},
    db::models::{ControlEvent, SensorReading},
    sensors::models::LatestReading,
};

/// Pattern used for control-event timestamps, e.g. `2025-03-14 09:26:53`.
pub const EVENT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A sensor reading, either a stored row or the in-memory fallback.
///
/// `id` is `null` when the value comes from the cache rather than the store;
/// every field is `null` before the first message arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SensorReadingDto {
    pub id: Option<i64>,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity percentage
    pub humidity: Option<f64>,
    pub light: Option<i32>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<SensorReading> for SensorReadingDto {
    fn from(r: SensorReading) -> Self {
        Self {
            id: Some(r.id),
            temperature: r.temperature,
            humidity: r.humidity,
            light: r.light,
            timestamp: Some(r.recorded_at),
        }
    }
}

impl From<LatestReading> for SensorReadingDto {
    fn from(r: LatestReading) -> Self {
        Self {
            id: None,
            temperature: r.temperature,
            humidity: r.humidity,
            light: r.light,
            timestamp: r.updated_at,
        }
    }
}

/// Query string for `GET /api/sensors/history`.
///
/// Every field is free text; unknown values are replaced with defaults when
/// the query is resolved, never rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub sort_field: Option<String>,
    pub order: Option<String>,
    pub search_field: Option<String>,
    pub search_query: Option<String>,
}

/// A logged actuator command with channels rendered as `ON`/`OFF`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ControlEventDto {
    pub id: i64,
    pub led1: Switch,
    pub led2: Switch,
    pub led3: Switch,
    pub source: String,
    /// `YYYY-MM-DD HH:MM:SS`, UTC
    pub timestamp: String,
}

impl From<ControlEvent> for ControlEventDto {
    fn from(e: ControlEvent) -> Self {
        Self {
            id: e.id,
            led1: e.led1.into(),
            led2: e.led2.into(),
            led3: e.led3.into(),
            source: e.source,
            timestamp: e.recorded_at.format(EVENT_TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Response for a successful `POST /api/led`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommandResponse {
    pub message: String,
    pub state: ActuatorState,
}
