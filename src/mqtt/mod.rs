pub mod client;

use std::sync::Arc;

use async_trait::async_trait;

pub use client::{MqttChannel, MqttConnection};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("mqtt client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("message channel is closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Receives every message published on a topic the handler was subscribed to.
///
/// Handlers own their error handling: a failed message is logged and dropped,
/// it never stops delivery of the next one.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, topic: &str, payload: &[u8]);
}

/// Publish/subscribe transport used by the ingest and control paths.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Register `handler` for messages matching `topic` (MQTT filter syntax).
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BrokerError>;

    /// Fire-and-forget publish of `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError>;
}

// ---------------------------------------------------------------------------
// Topic matching
// ---------------------------------------------------------------------------

/// Returns `true` when `topic` matches the subscription `filter`.
///
/// Supports the single-level `+` and multi-level `#` wildcards; `#` is only
/// honoured as the last level.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
