use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{control::models::ActuatorState, sensors::models::LatestReading};

#[derive(Debug, Default)]
struct Snapshot {
    reading: LatestReading,
    actuators: ActuatorState,
}

/// Process-wide last-known state: the latest sensor reading and the latest
/// actuator command.
///
/// Wrapped in `Arc` so it can be cheaply cloned into the ingest task, the
/// control service and the HTTP handlers. Each update replaces a whole record
/// under the write lock, so readers never observe a half-applied update.
#[derive(Clone, Default)]
pub struct StateCache {
    inner: Arc<RwLock<Snapshot>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the cached reading. Last write wins.
    pub async fn update_reading(&self, reading: LatestReading) {
        self.inner.write().await.reading = reading;
    }

    pub async fn latest_reading(&self) -> LatestReading {
        self.inner.read().await.reading
    }

    /// Overwrite the cached actuator state. Last write wins.
    pub async fn set_actuators(&self, state: ActuatorState) {
        self.inner.write().await.actuators = state;
    }

    pub async fn actuators(&self) -> ActuatorState {
        self.inner.read().await.actuators
    }
}
