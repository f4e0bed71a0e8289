//! Command envelope and typed payloads
//!
//! The envelope is the unit exchanged between the ledger and a device, both
//! on the pull path and as the retained broker publish.

#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Command type tag for channel output changes
pub const CHANNEL_SET: &str = "channel.set";

/// Serialized command as seen by a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    /// Ledger row id, monotonic
    pub id: i64,
    /// Free-form command tag, e.g. `channel.set`
    #[serde(rename = "type")]
    pub command_type: String,
    /// Opaque serialized command body
    pub payload_json: String,
    /// Enqueue time
    pub created_at: DateTime<Utc>,
    /// Claim time, absent until a device pulled the command
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dequeued_at: Option<DateTime<Utc>>,
}

/// Full ledger row, including the acknowledgment state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    /// Envelope as delivered
    pub envelope: CommandEnvelope,
    /// Target device
    pub device_id: Uuid,
    /// Acknowledgment time; set once, terminal
    pub acked_at: Option<DateTime<Utc>>,
}

impl CommandRecord {
    /// Whether the row is still eligible for claiming
    pub fn is_pending(&self) -> bool {
        self.envelope.dequeued_at.is_none() && self.acked_at.is_none()
    }
}

/// Payload of a `channel.set` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSet {
    /// Channel being switched
    pub channel_id: Uuid,
    /// Hardware pin on the device
    pub pin: i32,
    /// Desired output state
    pub state: bool,
}
