use std::{num::NonZeroUsize, str::FromStr, time::Duration};

use anyhow::{bail, Context, Result};

// ---------------------------------------------------------------------------
// MqttConfig
// ---------------------------------------------------------------------------

/// Broker connection settings and the two topics the relay cares about.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// `(username, password)`; both must be set or neither.
    pub credentials: Option<(String, String)>,
    pub keep_alive: Duration,
    /// Topic the device publishes readings on.
    pub sensor_topic: String,
    /// Topic actuator commands are published to.
    pub control_topic: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    /// How long a query waits for a pooled connection before giving up.
    pub db_acquire_timeout: Duration,
    pub server_host: String,
    pub server_port: u16,
    pub mqtt: MqttConfig,
    /// Number of rows returned by `GET /api/led/history`.
    pub control_history_limit: i64,
    /// Readings waiting to be written; beyond this they are only cached.
    pub ingest_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", "10")?,
            db_acquire_timeout: Duration::from_millis(parsed("DB_ACQUIRE_TIMEOUT_MS", "3000")?),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: parsed("SERVER_PORT", "3000")?,
            mqtt: MqttConfig {
                host: optional("MQTT_HOST", "localhost"),
                port: parsed("MQTT_PORT", "1883")?,
                client_id: std::env::var("MQTT_CLIENT_ID")
                    .unwrap_or_else(|_| default_client_id()),
                credentials: credentials(
                    std::env::var("MQTT_USERNAME").ok(),
                    std::env::var("MQTT_PASSWORD").ok(),
                )?,
                keep_alive: Duration::from_secs(parsed("MQTT_KEEP_ALIVE_SECS", "30")?),
                sensor_topic: optional("SENSOR_TOPIC", "iot/sensor/data"),
                control_topic: optional("CONTROL_TOPIC", "iot/led/control"),
            },
            control_history_limit: positive(parsed("CONTROL_HISTORY_LIMIT", "100")?)
                .context("CONTROL_HISTORY_LIMIT must be greater than zero")?,
            ingest_queue_capacity: parsed::<NonZeroUsize>("INGEST_QUEUE_CAPACITY", "256")?.get(),
        })
    }
}

/// A fresh client id per process so two relays never kick each other off the broker.
fn default_client_id() -> String {
    format!("telemetry-relay-{}", uuid::Uuid::new_v4().simple())
}

fn credentials(
    username: Option<String>,
    password: Option<String>,
) -> Result<Option<(String, String)>> {
    match (username, password) {
        (Some(u), Some(p)) => Ok(Some((u, p))),
        (None, None) => Ok(None),
        _ => bail!("MQTT_USERNAME and MQTT_PASSWORD must be set together"),
    }
}

fn positive(v: i64) -> Result<i64> {
    if v > 0 {
        Ok(v)
    } else {
        bail!("expected a positive value, got {v}")
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parsed<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    optional(key, default)
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a valid number"))
}
