use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnAck, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet,
    QoS,
};
use tokio::{sync::RwLock, task::JoinHandle, time};
use tracing::{debug, error, info, warn};

use super::{topic_matches, BrokerError, MessageChannel, MessageHandler};
use crate::config::MqttConfig;

/// Capacity of the request queue between `AsyncClient` and the event loop.
const REQUEST_CAPACITY: usize = 64;
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

type Subscription = (String, Arc<dyn MessageHandler>);

// ---------------------------------------------------------------------------
// MqttChannel
// ---------------------------------------------------------------------------

/// `MessageChannel` backed by an MQTT broker.
///
/// Cheap to clone; all clones share one broker session and one handler table.
#[derive(Clone)]
pub struct MqttChannel {
    inner: Arc<Inner>,
}

struct Inner {
    client: AsyncClient,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl MqttChannel {
    /// Creates the client and spawns the event loop task.
    ///
    /// The connection is established in the background; until it is up,
    /// subscribe and publish requests are queued by `rumqttc`.
    pub fn connect(config: &MqttConfig) -> (Self, MqttConnection) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);
        if let Some((username, password)) = &config.credentials {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let channel = Self {
            inner: Arc::new(Inner {
                client: client.clone(),
                subscriptions: RwLock::new(Vec::new()),
            }),
        };

        info!(host = %config.host, port = config.port, client_id = %config.client_id, "Connecting to MQTT broker");
        let handle = tokio::spawn(run(event_loop, channel.clone()));

        (channel, MqttConnection { client, handle })
    }

    async fn resubscribe_all(&self) {
        let topics: Vec<String> = self
            .inner
            .subscriptions
            .read()
            .await
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect();

        for topic in topics {
            if let Err(e) = self.inner.client.subscribe(&topic, QoS::AtLeastOnce).await {
                error!(topic = %topic, error = %e, "Failed to resubscribe");
            }
        }
    }

    /// Runs every handler whose filter matches `topic`, one after another.
    async fn dispatch(&self, topic: &str, payload: &[u8]) {
        let handlers: Vec<Arc<dyn MessageHandler>> = self
            .inner
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|(filter, _)| topic_matches(filter, topic))
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        if handlers.is_empty() {
            debug!(topic = %topic, "No handler for topic; message ignored");
            return;
        }

        for handler in handlers {
            handler.handle(topic, payload).await;
        }
    }
}

#[async_trait]
impl MessageChannel for MqttChannel {
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BrokerError> {
        self.inner
            .subscriptions
            .write()
            .await
            .push((topic.to_owned(), handler));
        self.inner.client.subscribe(topic, QoS::AtLeastOnce).await?;
        info!(topic = %topic, "Subscribed");
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        self.inner
            .client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        debug!(topic = %topic, "Publish queued");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Drives the MQTT session until a Disconnect is sent or received.
///
/// Connection errors never end the loop: `rumqttc` reconnects on the next
/// poll, so we only wait (with capped exponential growth) before retrying.
/// Whether a successful ConnAck should replay the subscription list.
///
/// The first connection sends the SUBSCRIBE requests queued by `subscribe`,
/// so only a reconnect that lost its session needs a replay.
fn should_resubscribe(session_present: bool, connected_before: bool) -> bool {
    connected_before && !session_present
}

async fn run(mut event_loop: EventLoop, channel: MqttChannel) {
    let mut error_count: u32 = 0;
    let mut connected_before = false;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ConnAck {
                session_present,
                code: ConnectReturnCode::Success,
            }))) => {
                error_count = 0;
                info!(session_present, "Connected to MQTT broker");
                if should_resubscribe(session_present, connected_before) {
                    channel.resubscribe_all().await;
                }
                connected_before = true;
            }
            Ok(Event::Incoming(Packet::ConnAck(ConnAck { code, .. }))) => {
                error!(code = ?code, "MQTT broker rejected connection");
            }
            Ok(Event::Incoming(Packet::Publish(p))) => {
                error_count = 0;
                debug!(topic = %p.topic, payload_size = p.payload.len(), "Received MQTT message");
                channel.dispatch(&p.topic, &p.payload).await;
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                info!("Broker closed the MQTT session");
                break;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error_count = error_count.saturating_add(1);
                let delay = retry_delay(error_count);
                warn!(error = %e, error_count, delay = ?delay, "MQTT connection error; retrying");
                time::sleep(delay).await;
            }
        }
    }

    info!("MQTT event loop stopped");
}

fn retry_delay(error_count: u32) -> Duration {
    let exp = error_count.saturating_sub(1).min(10);
    (INITIAL_RETRY_DELAY * 2_u32.pow(exp)).min(MAX_RETRY_DELAY)
}

// ---------------------------------------------------------------------------
// MqttConnection
// ---------------------------------------------------------------------------

/// Lifecycle handle for the background event loop.
pub struct MqttConnection {
    client: AsyncClient,
    handle: JoinHandle<()>,
}

impl MqttConnection {
    /// Sends an MQTT Disconnect and waits for the event loop to finish.
    pub async fn shutdown(self) {
        if let Err(e) = self.client.disconnect().await {
            warn!(error = %e, "Failed to send MQTT disconnect");
            self.handle.abort();
            return;
        }
        if let Err(e) = self.handle.await {
            warn!(error = %e, "MQTT event loop task failed");
        }
    }
}
