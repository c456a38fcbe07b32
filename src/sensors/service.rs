use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

use super::models::{LatestReading, SensorPayload};
use crate::{db::Store, mqtt::MessageHandler, state_cache::StateCache};

/// Ingests messages from the sensor topic: cache first, then storage.
///
/// Rows are written by a background worker fed through a bounded queue, so a
/// slow or unreachable database never holds up the MQTT event loop. Readings
/// that find the queue full are kept in the cache only.
pub struct SensorService {
    cache: StateCache,
    persist: mpsc::Sender<SensorPayload>,
}

impl SensorService {
    /// Spawns the persist worker; must be called inside a tokio runtime.
    pub fn new(store: Arc<dyn Store>, cache: StateCache, queue_capacity: usize) -> Self {
        let (persist, rx) = mpsc::channel(queue_capacity.max(1));
        tokio::spawn(persist_readings(store, rx));
        Self { cache, persist }
    }

    /// Parses `bytes`, overwrites the cached reading and queues a row.
    ///
    /// Only a parse failure is returned as an error. Storage problems are
    /// logged: the reading is still in the cache, it is just missing from
    /// durable storage.
    pub async fn ingest(&self, bytes: &[u8]) -> Result<LatestReading, serde_json::Error> {
        let payload = SensorPayload::parse(bytes)?;
        let reading = LatestReading::from_payload(payload, Utc::now());
        self.cache.update_reading(reading).await;

        debug!(
            temperature = ?payload.temperature,
            humidity = ?payload.humidity,
            light = ?payload.light,
            "Sensor reading cached"
        );

        match self.persist.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(
                capacity = self.persist.max_capacity(),
                "Persist queue full; sensor reading kept in cache only"
            ),
            Err(TrySendError::Closed(_)) => {
                error!("Persist worker stopped; sensor reading kept in cache only")
            }
        }

        Ok(reading)
    }
}

/// Writes queued readings in arrival order until every sender is dropped.
async fn persist_readings(store: Arc<dyn Store>, mut rx: mpsc::Receiver<SensorPayload>) {
    while let Some(payload) = rx.recv().await {
        match store.insert_reading(&payload).await {
            Ok(row) => debug!(id = row.id, "Sensor reading persisted"),
            Err(e) => error!(error = %e, "Failed to persist sensor reading"),
        }
    }
    debug!("Sensor persist worker stopped");
}

#[async_trait]
impl MessageHandler for SensorService {
    async fn handle(&self, topic: &str, payload: &[u8]) {
        if let Err(e) = self.ingest(payload).await {
            warn!(topic = %topic, error = %e, "Dropping malformed sensor message");
        }
    }
}
