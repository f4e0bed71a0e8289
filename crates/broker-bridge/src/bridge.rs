//! Broker connection supervisor
//!
//! `Disconnected -> Connecting -> Connected -> (error) Disconnected`, retried
//! forever with a fixed backoff. Every await point races the shutdown signal.
//! Outbound work that arrives while not connected is dropped with a warning;
//! the ledger row it came from stays pollable.

use std::sync::Arc;
use std::time::Duration;

use marinelink_core::BrokerConfig;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::error::BridgeError;
use crate::handle::{BridgeHandle, Outbound};
use crate::handlers::InboundHandler;
use crate::topics::Topics;

const OUTBOUND_CAPACITY: usize = 256;
const REQUEST_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Connected,
}

enum SessionEnd {
    Shutdown,
    Lost(BridgeError),
}

pub struct BrokerBridge {
    config: BrokerConfig,
    topics: Topics,
    handler: Arc<InboundHandler>,
    outbound: mpsc::Receiver<Outbound>,
    outbound_open: bool,
    state: watch::Sender<BridgeState>,
}

impl BrokerBridge {
    /// Build the bridge and the handle request handlers publish through.
    pub fn new(config: BrokerConfig, handler: InboundHandler) -> (Self, BridgeHandle) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (state_tx, state_rx) = watch::channel(BridgeState::Disconnected);

        let bridge = Self {
            topics: Topics::new(&config.base_topic),
            config,
            handler: Arc::new(handler),
            outbound: rx,
            outbound_open: true,
            state: state_tx,
        };
        (bridge, BridgeHandle::new(tx, state_rx))
    }

    /// Supervise the connection until `shutdown` flips to true.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            host = %self.config.host,
            port = self.config.port,
            base_topic = %self.config.base_topic,
            "Broker bridge starting"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(BridgeState::Connecting);
            let (client, mut eventloop) = AsyncClient::new(self.mqtt_options(), REQUEST_CAPACITY);

            match self.session(&client, &mut eventloop, &mut shutdown).await {
                SessionEnd::Shutdown => {
                    if client.try_disconnect().is_ok() {
                        // Let the DISCONNECT packet go out
                        let _ = tokio::time::timeout(Duration::from_secs(1), eventloop.poll()).await;
                    }
                    break;
                }
                SessionEnd::Lost(e) => {
                    warn!(error = %e, "Broker connection lost");
                }
            }

            self.set_state(BridgeState::Disconnected);
            if !self.backoff(&mut shutdown).await {
                break;
            }
        }

        self.set_state(BridgeState::Disconnected);
        info!("Broker bridge stopped");
    }

    fn mqtt_options(&self) -> MqttOptions {
        let client_id = format!("{}-{}", self.config.client_id, Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, &self.config.host, self.config.port);
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs.max(5)));
        options.set_clean_session(true);

        if let (Some(u), Some(p)) = (&self.config.username, &self.config.password) {
            options.set_credentials(u, p);
        }
        options
    }

    async fn session(
        &mut self,
        client: &AsyncClient,
        eventloop: &mut EventLoop,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let mut connected = false;

        loop {
            tokio::select! {
                polled = eventloop.poll() => match polled {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        if ack.code != ConnectReturnCode::Success {
                            return SessionEnd::Lost(BridgeError::Refused(ack.code));
                        }
                        for filter in self.topics.subscriptions() {
                            if let Err(e) = client.try_subscribe(filter, QoS::AtLeastOnce) {
                                return SessionEnd::Lost(e.into());
                            }
                        }
                        connected = true;
                        self.set_state(BridgeState::Connected);
                        info!("Broker connected, subscriptions requested");
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => self.dispatch(publish),
                    Ok(Event::Incoming(Packet::SubAck(ack))) => {
                        debug!(pkid = ack.pkid, "Subscription acknowledged");
                    }
                    Ok(_) => {}
                    Err(e) => return SessionEnd::Lost(e.into()),
                },
                item = self.outbound.recv(), if self.outbound_open => match item {
                    Some(item) if connected => self.send(client, item),
                    Some(item) => drop_disconnected(item),
                    None => self.outbound_open = false,
                },
                _ = shutdown.changed() => return SessionEnd::Shutdown,
            }
        }
    }

    /// Wait out the reconnect backoff. Returns false on shutdown.
    async fn backoff(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let delay = Duration::from_secs(self.config.reconnect_backoff_secs.max(1));
        debug!(delay_secs = delay.as_secs(), "Reconnecting after backoff");

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                item = self.outbound.recv(), if self.outbound_open => match item {
                    Some(item) => drop_disconnected(item),
                    None => self.outbound_open = false,
                },
                _ = shutdown.changed() => return false,
            }
        }
    }

    fn send(&self, client: &AsyncClient, item: Outbound) {
        let message = match outbound_message(&self.topics, &item) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, ?item, "Envelope serialization failed");
                return;
            }
        };

        let OutboundMessage {
            topic,
            payload,
            qos,
            retain,
        } = message;
        match client.try_publish(topic.clone(), qos, retain, payload) {
            Ok(()) => trace!(topic = %topic, ?item, "Retained publish queued"),
            Err(e) => warn!(topic = %topic, error = %e, "Retained publish failed"),
        }
    }

    fn dispatch(&self, publish: Publish) {
        let handler = Arc::clone(&self.handler);
        let topic = String::from_utf8_lossy(publish.topic.as_ref()).into_owned();
        let payload = publish.payload;

        tokio::task::spawn_blocking(move || {
            let outcome = handler.handle(&topic, &payload);
            trace!(topic = %topic, ?outcome, "Inbound message handled");
        });
    }

    fn set_state(&self, state: BridgeState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!(from = ?*current, to = ?state, "Broker bridge state");
                *current = state;
                true
            }
        });
    }
}

/// A single MQTT publish derived from outbound work.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutboundMessage {
    topic: String,
    payload: Vec<u8>,
    qos: QoS,
    retain: bool,
}

/// Commands go out retained at QoS 1 on the device's command topic. An
/// empty retained payload on the same topic deletes the retained command.
fn outbound_message(topics: &Topics, item: &Outbound) -> serde_json::Result<OutboundMessage> {
    let (device_id, payload) = match item {
        Outbound::Publish { device_id, envelope } => (*device_id, serde_json::to_vec(envelope)?),
        Outbound::ClearRetained { device_id } => (*device_id, Vec::new()),
    };

    Ok(OutboundMessage {
        topic: topics.command(device_id),
        payload,
        qos: QoS::AtLeastOnce,
        retain: true,
    })
}

fn drop_disconnected(item: Outbound) {
    match item {
        Outbound::Publish { device_id, envelope } => warn!(
            device_id = %device_id,
            command_id = envelope.id,
            "Broker not connected, live push dropped"
        ),
        Outbound::ClearRetained { device_id } => warn!(
            device_id = %device_id,
            "Broker not connected, retained clear dropped"
        ),
    }
}
