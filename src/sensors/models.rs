use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// SensorPayload: message body on the sensor topic
//
//   {"temperature": 26.5, "humidity": 55, "light": 420}
//
// Every field is optional: a device with a missing sensor simply omits it (or
// sends null) and the reading is stored with that column null. Wrong types
// (e.g. a string temperature) make the whole message invalid. `light` may be
// sent as `420` or `420.0`; a fractional or out-of-range value is rejected.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct SensorPayload {
    /// Degrees Celsius.
    pub temperature: Option<f64>,
    /// Relative humidity percentage.
    pub humidity: Option<f64>,
    /// Raw light level as reported by the device.
    #[serde(default, deserialize_with = "whole_number")]
    pub light: Option<i32>,
}

fn whole_number<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(v) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if v.fract() == 0.0 && v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX) {
        Ok(Some(v as i32))
    } else {
        Err(de::Error::custom(format!("light must be a whole number, got {v}")))
    }
}

impl SensorPayload {
    pub fn parse(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

// ---------------------------------------------------------------------------
// LatestReading: cached last-known sensor values
// ---------------------------------------------------------------------------

/// The most recent reading seen on the sensor topic.
///
/// `updated_at` is `None` until the first message arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatestReading {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub light: Option<i32>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LatestReading {
    pub fn from_payload(payload: SensorPayload, at: DateTime<Utc>) -> Self {
        Self {
            temperature: payload.temperature,
            humidity: payload.humidity,
            light: payload.light,
            updated_at: Some(at),
        }
    }
}
