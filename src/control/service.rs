use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use super::{
    models::{ActuatorCommand, ActuatorState},
    ControlError,
};
use crate::{db::Store, mqtt::MessageChannel, state_cache::StateCache};

/// Source label recorded with every command issued through the HTTP API.
pub const API_SOURCE: &str = "API";

/// Validates actuator commands and fans them out to the broker, the cache and
/// the control log, in that order.
#[derive(Clone)]
pub struct ControlService {
    channel: Arc<dyn MessageChannel>,
    store: Arc<dyn Store>,
    cache: StateCache,
    topic: String,
    /// Serializes publish, cache update and log append across requests.
    command_lock: Arc<Mutex<()>>,
}

impl ControlService {
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        store: Arc<dyn Store>,
        cache: StateCache,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            store,
            cache,
            topic: topic.into(),
            command_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Applies `command` and returns the resulting state.
    ///
    /// Nothing happens unless every channel carries a valid token. Once the
    /// publish succeeds the command is considered delivered: a failure to
    /// append the control event is logged and does not undo it.
    ///
    /// Concurrent commands are applied one at a time, so the cached state and
    /// the control log always follow the order the broker saw.
    pub async fn apply(&self, command: &ActuatorCommand) -> Result<ActuatorState, ControlError> {
        let state = ActuatorState::try_from(command)?;
        let payload = serde_json::to_vec(&state)?;

        let _guard = self.command_lock.lock().await;
        self.channel.publish(&self.topic, payload).await?;
        self.cache.set_actuators(state).await;

        info!(
            topic = %self.topic,
            led1 = %state.led1,
            led2 = %state.led2,
            led3 = %state.led3,
            "Actuator command published"
        );

        if let Err(e) = self.store.insert_control_event(&state, API_SOURCE).await {
            error!(error = %e, "Failed to log control event");
        }

        Ok(state)
    }

    /// Current actuator state, straight from the cache.
    pub async fn state(&self) -> ActuatorState {
        self.cache.actuators().await
    }
}
