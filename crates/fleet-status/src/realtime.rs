//! Realtime Fan-out
//!
//! One `tokio::sync::broadcast` group per boat. Groups are created on first
//! subscription and dropped once their last receiver is gone. Sending is
//! fire-and-forget: a boat nobody watches simply swallows the event.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use marinelink_domain::{BoatId, ChannelId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::alerts::Alert;
use crate::telemetry::TelemetrySample;

const GROUP_CAPACITY: usize = 256;

/// Event pushed to dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RealtimeEvent {
    #[serde(rename = "channel.state")]
    ChannelState(ChannelStateEvent),

    #[serde(rename = "telemetry")]
    Telemetry(TelemetryEvent),

    #[serde(rename = "alert")]
    Alert(Alert),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStateEvent {
    pub channel_id: ChannelId,
    pub pin: i32,
    pub state: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

impl From<&TelemetrySample> for TelemetryEvent {
    fn from(sample: &TelemetrySample) -> Self {
        Self {
            key: sample.key.clone(),
            value: sample.value.clone(),
            created_at: sample.created_at,
        }
    }
}

/// Boat-scoped broadcast groups.
#[derive(Debug, Default)]
pub struct FanoutHub {
    groups: RwLock<HashMap<BoatId, broadcast::Sender<RealtimeEvent>>>,
}

impl FanoutHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the boat's group.
    pub fn subscribe(&self, boat_id: BoatId) -> broadcast::Receiver<RealtimeEvent> {
        let mut groups = self.groups.write().unwrap_or_else(|e| e.into_inner());
        groups
            .entry(boat_id)
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, boat_id: BoatId) -> usize {
        let groups = self.groups.read().unwrap_or_else(|e| e.into_inner());
        groups.get(&boat_id).map_or(0, |tx| tx.receiver_count())
    }

    pub fn broadcast_channel_state(&self, boat_id: BoatId, channel_id: ChannelId, pin: i32, state: bool) {
        self.publish(
            boat_id,
            RealtimeEvent::ChannelState(ChannelStateEvent {
                channel_id,
                pin,
                state,
            }),
        );
    }

    pub fn broadcast_telemetry(&self, boat_id: BoatId, sample: &TelemetrySample) {
        self.publish(boat_id, RealtimeEvent::Telemetry(sample.into()));
    }

    pub fn broadcast_alert(&self, boat_id: BoatId, alert: &Alert) {
        self.publish(boat_id, RealtimeEvent::Alert(alert.clone()));
    }

    /// Deliver to everyone currently in the boat group. Returns the number
    /// of receivers reached.
    pub fn publish(&self, boat_id: BoatId, event: RealtimeEvent) -> usize {
        let delivered = {
            let groups = self.groups.read().unwrap_or_else(|e| e.into_inner());
            match groups.get(&boat_id) {
                Some(tx) => tx.send(event).ok(),
                None => return 0,
            }
        };

        match delivered {
            Some(n) => n,
            None => {
                // Every receiver is gone
                let mut groups = self.groups.write().unwrap_or_else(|e| e.into_inner());
                if groups.get(&boat_id).is_some_and(|tx| tx.receiver_count() == 0) {
                    groups.remove(&boat_id);
                    trace!(boat_id = %boat_id, "Dropped empty realtime group");
                }
                0
            }
        }
    }
}
