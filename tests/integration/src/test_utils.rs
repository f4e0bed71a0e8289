//! Test utilities for cross-crate integration tests

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use marinelink_broker_bridge::{InboundHandler, Topics};
use marinelink_command_ledger::{CommandEnvelope, CommandLedger, CommandPublisher, PublishError};
use marinelink_core::{Config, Database};
use marinelink_crypto::{compute_hex, CredentialStore, DeviceKey, MasterKey};
use marinelink_domain::{
    BoatRepository, Channel, ChannelCreate, ChannelRepository, ChannelType, DeviceRegistry,
    RequestAuthenticator,
};
use marinelink_fleet_status::{
    FanoutHub, PresenceTracker, TelemetryPipeline, TelemetryStore, ThresholdRules,
};
use uuid::Uuid;

/// Publisher that records live pushes instead of talking to a broker.
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(Uuid, i64)>>,
    pub cleared: Mutex<Vec<Uuid>>,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<(Uuid, i64)> {
        self.published.lock().unwrap().clone()
    }

    pub fn cleared(&self) -> Vec<Uuid> {
        self.cleared.lock().unwrap().clone()
    }
}

impl CommandPublisher for RecordingPublisher {
    fn publish(&self, device_id: Uuid, envelope: &CommandEnvelope) -> Result<(), PublishError> {
        self.published.lock().unwrap().push((device_id, envelope.id));
        Ok(())
    }

    fn clear_retained(&self, device_id: Uuid) -> Result<(), PublishError> {
        self.cleared.lock().unwrap().push(device_id);
        Ok(())
    }
}

/// A registered device and its plaintext key.
pub struct TestDevice {
    pub id: Uuid,
    pub key: DeviceKey,
}

impl TestDevice {
    /// Hex HMAC over `body` with this device's key
    pub fn sign(&self, body: &[u8]) -> String {
        compute_hex(self.key.as_bytes(), body).unwrap()
    }
}

/// One owner with one boat, and every component wired over a shared
/// temporary database.
pub struct TestFleet {
    pub config: Config,
    pub db: Database,
    pub owner: Uuid,
    pub boat_id: Uuid,
    pub boats: BoatRepository,
    pub devices: DeviceRegistry,
    pub channels: ChannelRepository,
    pub authenticator: RequestAuthenticator,
    pub ledger: CommandLedger,
    pub publisher: Arc<RecordingPublisher>,
    pub presence: PresenceTracker,
    pub telemetry: TelemetryPipeline,
    pub hub: Arc<FanoutHub>,
    pub inbound: InboundHandler,
    db_path: PathBuf,
}

impl TestFleet {
    pub fn new() -> Self {
        let config = Config::default_config();
        let db = Database::open_temp("test_fleet").unwrap();
        let db_path = db.path().to_path_buf();
        let credentials = Arc::new(CredentialStore::new(MasterKey::generate(1)));
        let hub = Arc::new(FanoutHub::new());
        let publisher = Arc::new(RecordingPublisher::default());

        let boats = BoatRepository::new(db.clone());
        let owner = Uuid::new_v4();
        let boat_id = boats.create(owner, "Sea Breeze").unwrap().id;

        let devices = DeviceRegistry::new(db.clone(), credentials);
        let pipeline = || {
            TelemetryPipeline::new(
                TelemetryStore::new(db.clone()),
                hub.clone(),
                Arc::new(ThresholdRules::from_config(&config.alerts)),
            )
        };

        let inbound = InboundHandler::new(
            Topics::new(&config.broker.base_topic),
            PresenceTracker::new(db.clone()),
            ChannelRepository::new(db.clone()),
            boats.clone(),
            pipeline(),
            hub.clone(),
        );

        Self {
            owner,
            boat_id,
            authenticator: RequestAuthenticator::new(devices.clone()),
            devices,
            channels: ChannelRepository::new(db.clone()),
            ledger: CommandLedger::new(db.clone(), publisher.clone()),
            publisher,
            presence: PresenceTracker::new(db.clone()),
            telemetry: pipeline(),
            inbound,
            hub,
            boats,
            config,
            db,
            db_path,
        }
    }

    pub fn add_device(&self, name: &str) -> TestDevice {
        let (summary, key) = self.devices.create(self.owner, name).unwrap();
        TestDevice {
            id: summary.id,
            key,
        }
    }

    pub fn add_channel(&self, name: &str, pin: i32) -> Channel {
        self.channels
            .create(
                self.owner,
                &ChannelCreate {
                    name: name.to_string(),
                    channel_type: ChannelType::Light,
                    pin,
                },
            )
            .unwrap()
    }

    /// Full topic under the configured base, e.g. `device/{id}/status`.
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.config.broker.base_topic, suffix)
    }
}

impl Default for TestFleet {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestFleet {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
        for suffix in ["-wal", "-shm"] {
            let mut side = self.db_path.clone().into_os_string();
            side.push(suffix);
            let _ = std::fs::remove_file(side);
        }
    }
}
