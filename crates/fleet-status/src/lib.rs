//! Fleet status for MarineLink
//!
//! Everything dashboards observe about a boat:
//! - Presence Tracker: device online/offline and last-seen, boat aggregate
//! - Realtime Fan-out: boat-scoped broadcast groups and the websocket feed
//! - Telemetry store and ingest pipeline
//! - Alert policy evaluated at the telemetry-ingest boundary

pub mod alerts;
pub mod error;
pub mod presence;
pub mod realtime;
pub mod telemetry;
pub mod websocket;

pub use alerts::{Alert, AlertLevel, AlertPolicy, ThresholdRule, ThresholdRules};
pub use error::{FleetError, Result};
pub use presence::PresenceTracker;
pub use realtime::{ChannelStateEvent, FanoutHub, RealtimeEvent, TelemetryEvent};
pub use telemetry::{
    TelemetryInput, TelemetryPage, TelemetryPipeline, TelemetryQuery, TelemetrySample,
    TelemetryStore,
};
pub use websocket::FeedServer;
