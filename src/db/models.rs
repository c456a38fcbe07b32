use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A row of `sensor_data`. Rows are never updated or deleted.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SensorReading {
    pub id: i64,
    /// Degrees Celsius.
    pub temperature: Option<f64>,
    /// Relative humidity percentage.
    pub humidity: Option<f64>,
    pub light: Option<i32>,
    pub recorded_at: DateTime<Utc>,
}

/// A row of `device_log`: one actuator command issued through the API.
///
/// Channel values are stored as booleans (`true` = ON).
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ControlEvent {
    pub id: i64,
    pub led1: bool,
    pub led2: bool,
    pub led3: bool,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}
