//! Topic layout under the configured base prefix.

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundTopic {
    Status { device_id: Uuid },
    ChannelState { device_id: Uuid, pin: i32 },
    BoatTelemetry { boat_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct Topics {
    base: String,
}

impl Topics {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_matches('/').to_string(),
        }
    }

    pub fn command(&self, device_id: Uuid) -> String {
        format!("{}/device/{}/commands", self.base, device_id)
    }

    pub fn status_filter(&self) -> String {
        format!("{}/device/+/status", self.base)
    }

    pub fn channel_filter(&self) -> String {
        format!("{}/device/+/channel/+", self.base)
    }

    pub fn telemetry_filter(&self) -> String {
        format!("{}/boat/+/telemetry", self.base)
    }

    /// Subscriptions made on every (re)connect.
    pub fn subscriptions(&self) -> [String; 3] {
        [
            self.status_filter(),
            self.channel_filter(),
            self.telemetry_filter(),
        ]
    }

    /// Classify an inbound topic. Anything outside the layout is `None`.
    pub fn parse(&self, topic: &str) -> Option<InboundTopic> {
        let rest = topic.strip_prefix(&self.base)?.strip_prefix('/')?;
        let parts: Vec<&str> = rest.split('/').collect();

        match parts.as_slice() {
            ["device", id, "status"] => Some(InboundTopic::Status {
                device_id: Uuid::parse_str(id).ok()?,
            }),
            ["device", id, "channel", pin] => Some(InboundTopic::ChannelState {
                device_id: Uuid::parse_str(id).ok()?,
                pin: pin.parse().ok().filter(|p: &i32| *p >= 0)?,
            }),
            ["boat", id, "telemetry"] => Some(InboundTopic::BoatTelemetry {
                boat_id: Uuid::parse_str(id).ok()?,
            }),
            _ => None,
        }
    }
}
