use std::sync::Arc;

use marinelink_broker_bridge::{BridgeHandle, BridgeState, InboundHandler, Topics};
use marinelink_command_ledger::{CommandLedger, CommandPublisher};
use marinelink_core::{Config, Database};
use marinelink_crypto::CredentialStore;
use marinelink_domain::{BoatRepository, ChannelRepository, DeviceRegistry, RequestAuthenticator};
use marinelink_fleet_status::{
    FanoutHub, PresenceTracker, TelemetryPipeline, TelemetryStore, ThresholdRules,
};

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub boats: BoatRepository,
    pub devices: DeviceRegistry,
    pub channels: ChannelRepository,
    pub authenticator: RequestAuthenticator,
    pub ledger: CommandLedger,
    pub presence: PresenceTracker,
    pub telemetry: TelemetryPipeline,
    pub hub: Arc<FanoutHub>,
    pub bridge: Option<BridgeHandle>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        credentials: Arc<CredentialStore>,
        publisher: Arc<dyn CommandPublisher>,
        hub: Arc<FanoutHub>,
    ) -> Self {
        let devices = DeviceRegistry::new(db.clone(), credentials);
        let telemetry = TelemetryPipeline::new(
            TelemetryStore::new(db.clone()),
            hub.clone(),
            Arc::new(ThresholdRules::from_config(&config.alerts)),
        );

        Self {
            boats: BoatRepository::new(db.clone()),
            authenticator: RequestAuthenticator::new(devices.clone()),
            devices,
            channels: ChannelRepository::new(db.clone()),
            ledger: CommandLedger::new(db.clone(), publisher),
            presence: PresenceTracker::new(db.clone()),
            telemetry,
            hub,
            bridge: None,
            config,
            db,
        }
    }

    /// Attach the broker bridge handle, for status reporting.
    pub fn with_bridge(mut self, handle: BridgeHandle) -> Self {
        self.bridge = Some(handle);
        self
    }

    /// Handler for inbound broker messages over the same database and hub.
    pub fn inbound_handler(config: &Config, db: &Database, hub: &Arc<FanoutHub>) -> InboundHandler {
        InboundHandler::new(
            Topics::new(&config.broker.base_topic),
            PresenceTracker::new(db.clone()),
            ChannelRepository::new(db.clone()),
            BoatRepository::new(db.clone()),
            TelemetryPipeline::new(
                TelemetryStore::new(db.clone()),
                hub.clone(),
                Arc::new(ThresholdRules::from_config(&config.alerts)),
            ),
            hub.clone(),
        )
    }

    pub fn broker_state(&self) -> Option<BridgeState> {
        self.bridge.as_ref().map(|b| b.state())
    }
}
