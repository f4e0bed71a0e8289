//! Inbound broker message handling
//!
//! Handlers are synchronous and open their own connections through the
//! repositories they use. Device-originated noise is never an error for the
//! bridge: every failure is logged and reported as [`InboundOutcome::Dropped`].

use std::sync::Arc;

use marinelink_core::CoreError;
use marinelink_domain::{BoatRepository, ChannelRepository};
use marinelink_fleet_status::{FanoutHub, PresenceTracker, TelemetryInput, TelemetryPipeline};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::topics::{InboundTopic, Topics};

const LOG_PAYLOAD_LIMIT: usize = 128;

/// What a handled message did, mostly for tests and trace logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    Presence { device_id: Uuid, online: bool },
    ChannelState { channel_id: Uuid, state: bool },
    Telemetry { boat_id: Uuid, alerts: usize },
    /// Matched nothing (unknown device, pin or boat)
    Ignored,
    /// Malformed or failed; already logged
    Dropped,
}

#[derive(Debug, Deserialize)]
struct StateEcho {
    state: bool,
}

#[derive(Clone)]
pub struct InboundHandler {
    topics: Topics,
    presence: PresenceTracker,
    channels: ChannelRepository,
    boats: BoatRepository,
    telemetry: TelemetryPipeline,
    hub: Arc<FanoutHub>,
}

impl InboundHandler {
    pub fn new(
        topics: Topics,
        presence: PresenceTracker,
        channels: ChannelRepository,
        boats: BoatRepository,
        telemetry: TelemetryPipeline,
        hub: Arc<FanoutHub>,
    ) -> Self {
        Self {
            topics,
            presence,
            channels,
            boats,
            telemetry,
            hub,
        }
    }

    pub fn handle(&self, topic: &str, payload: &[u8]) -> InboundOutcome {
        let Some(kind) = self.topics.parse(topic) else {
            debug!(topic, "Ignoring message on unexpected topic");
            return InboundOutcome::Ignored;
        };

        let result = match kind {
            InboundTopic::Status { device_id } => self.on_status(device_id, payload),
            InboundTopic::ChannelState { device_id, pin } => {
                self.on_channel_state(device_id, pin, payload)
            }
            InboundTopic::BoatTelemetry { boat_id } => self.on_telemetry(boat_id, payload),
        };

        result.unwrap_or_else(|e| {
            warn!(
                topic,
                payload = %truncated(payload),
                error = %e,
                "Dropping inbound message"
            );
            InboundOutcome::Dropped
        })
    }

    fn on_status(&self, device_id: Uuid, payload: &[u8]) -> Result<InboundOutcome, CoreError> {
        let online = is_online(payload);
        if self.presence.set_online(device_id, online)? {
            Ok(InboundOutcome::Presence { device_id, online })
        } else {
            Ok(InboundOutcome::Ignored)
        }
    }

    fn on_channel_state(
        &self,
        device_id: Uuid,
        pin: i32,
        payload: &[u8],
    ) -> Result<InboundOutcome, CoreError> {
        let echo: StateEcho = serde_json::from_slice(payload)?;

        match self.channels.apply_device_echo(device_id, pin, echo.state)? {
            Some(channel) => {
                self.hub
                    .broadcast_channel_state(channel.boat_id, channel.id, channel.pin, channel.state);
                Ok(InboundOutcome::ChannelState {
                    channel_id: channel.id,
                    state: channel.state,
                })
            }
            None => Ok(InboundOutcome::Ignored),
        }
    }

    fn on_telemetry(&self, boat_id: Uuid, payload: &[u8]) -> Result<InboundOutcome, CoreError> {
        let input: TelemetryInput = serde_json::from_slice(payload)?;

        if !self.boats.exists(boat_id)? {
            debug!(boat_id = %boat_id, "Telemetry for unknown boat ignored");
            return Ok(InboundOutcome::Ignored);
        }

        // Only the topic is trusted; a device claimed in the payload must be on this boat
        let device_id = match input.device_id {
            Some(id) if self.boats.has_device(boat_id, id)? => Some(id),
            Some(id) => {
                debug!(
                    boat_id = %boat_id,
                    device_id = %id,
                    "Telemetry device not on boat, stored unattributed"
                );
                None
            }
            None => None,
        };

        let outcome = self.telemetry.ingest(boat_id, device_id, &input)?;
        Ok(InboundOutcome::Telemetry {
            boat_id,
            alerts: outcome.alerts.len(),
        })
    }
}

/// `online` (any case, optionally JSON-quoted) is online; anything else is offline.
fn is_online(payload: &[u8]) -> bool {
    std::str::from_utf8(payload)
        .map(|s| s.trim().trim_matches('"').eq_ignore_ascii_case("online"))
        .unwrap_or(false)
}

fn truncated(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    if text.chars().count() > LOG_PAYLOAD_LIMIT {
        format!("{}...", text.chars().take(LOG_PAYLOAD_LIMIT).collect::<String>())
    } else {
        text.into_owned()
    }
}
