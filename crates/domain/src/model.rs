//! Domain entities and their wire shapes.
//!
//! Storage rows are converted into these types by the repositories; the
//! protected key of a device never appears in any of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type OwnerId = Uuid;
pub type BoatId = Uuid;
pub type DeviceId = Uuid;
pub type ChannelId = Uuid;

/// An owner's vessel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boat {
    pub id: BoatId,
    #[serde(skip_serializing)]
    pub owner_id: OwnerId,
    pub name: String,
}

/// Aggregate presence of all devices on a boat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoatStatus {
    pub online: bool,
    pub last_seen_utc: Option<DateTime<Utc>>,
}

/// Read view of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub boat_id: BoatId,
    pub name: String,
    pub is_active: bool,
    pub is_online: bool,
    pub last_seen_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCreate {
    pub name: String,
}

/// Returned once, when a device is created. Holds the plaintext key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCreated {
    pub device: DeviceSummary,
    pub device_key: String,
}

/// Returned once, when a device key is rotated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRotated {
    pub device_id: DeviceId,
    pub new_device_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Light,
    Pump,
    Fan,
    Aux,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Light => "light",
            ChannelType::Pump => "pump",
            ChannelType::Fan => "fan",
            ChannelType::Aux => "aux",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "light" => Some(ChannelType::Light),
            "pump" => Some(ChannelType::Pump),
            "fan" => Some(ChannelType::Fan),
            "aux" => Some(ChannelType::Aux),
            _ => None,
        }
    }
}

/// A logical output on a boat, addressed by hardware pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: ChannelId,
    pub boat_id: BoatId,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub pin: i32,
    pub state: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCreate {
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub pin: i32,
}

/// Owner toggle request. `None` flips the current state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToggleChannel {
    #[serde(default)]
    pub state: Option<bool>,
}
