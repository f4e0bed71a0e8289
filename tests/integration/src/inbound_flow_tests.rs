//! Inbound broker traffic: presence, channel echoes and telemetry.

use marinelink_broker_bridge::InboundOutcome;
use marinelink_domain::{ChannelCreate, ChannelType, DomainError};
use marinelink_fleet_status::{AlertLevel, RealtimeEvent};
use tokio::sync::broadcast::error::TryRecvError;

use crate::test_utils::TestFleet;

#[test]
fn test_status_online_marks_boat_online() {
    let fleet = TestFleet::new();
    let device = fleet.add_device("Helm relay");

    let before = fleet.presence.boat_status(fleet.boat_id).unwrap();
    assert!(!before.online);
    assert!(before.last_seen_utc.is_none());

    let topic = fleet.topic(&format!("device/{}/status", device.id));
    let outcome = fleet.inbound.handle(&topic, b"online");
    assert_eq!(
        outcome,
        InboundOutcome::Presence {
            device_id: device.id,
            online: true
        }
    );

    let status = fleet.presence.boat_status(fleet.boat_id).unwrap();
    assert!(status.online);
    let seen = status.last_seen_utc.unwrap();

    fleet.inbound.handle(&topic, b"offline");
    let status = fleet.presence.boat_status(fleet.boat_id).unwrap();
    assert!(!status.online);
    assert!(status.last_seen_utc.unwrap() >= seen);
}

#[tokio::test]
async fn test_channel_echo_updates_state_and_broadcasts() {
    let fleet = TestFleet::new();
    let device = fleet.add_device("Helm relay");
    let channel = fleet.add_channel("Bilge pump", 4);
    let mut events = fleet.hub.subscribe(fleet.boat_id);

    let topic = fleet.topic(&format!("device/{}/channel/4", device.id));
    let outcome = fleet.inbound.handle(&topic, br#"{"state":true}"#);
    assert_eq!(
        outcome,
        InboundOutcome::ChannelState {
            channel_id: channel.id,
            state: true
        }
    );

    let stored = fleet.channels.list(fleet.owner).unwrap();
    assert!(stored[0].state);

    match events.recv().await.unwrap() {
        RealtimeEvent::ChannelState(event) => {
            assert_eq!(event.channel_id, channel.id);
            assert_eq!(event.pin, 4);
            assert!(event.state);
        }
        other => panic!("unexpected event {:?}", other),
    }

    // No channel on that pin
    let unknown = fleet.topic(&format!("device/{}/channel/9", device.id));
    assert_eq!(fleet.inbound.handle(&unknown, br#"{"state":true}"#), InboundOutcome::Ignored);
}

#[tokio::test]
async fn test_low_battery_raises_alert_and_normal_does_not() {
    let fleet = TestFleet::new();
    let mut events = fleet.hub.subscribe(fleet.boat_id);
    let topic = fleet.topic(&format!("boat/{}/telemetry", fleet.boat_id));

    let outcome = fleet
        .inbound
        .handle(&topic, br#"{"key":"battery.voltage","value":"11.5"}"#);
    assert_eq!(
        outcome,
        InboundOutcome::Telemetry {
            boat_id: fleet.boat_id,
            alerts: 1
        }
    );
    assert!(matches!(events.recv().await.unwrap(), RealtimeEvent::Telemetry(_)));
    match events.recv().await.unwrap() {
        RealtimeEvent::Alert(alert) => {
            assert_eq!(alert.level, AlertLevel::Warning);
            assert_eq!(alert.key, "battery.voltage");
        }
        other => panic!("unexpected event {:?}", other),
    }

    let outcome = fleet
        .inbound
        .handle(&topic, br#"{"key":"battery.voltage","value":12.6}"#);
    assert_eq!(
        outcome,
        InboundOutcome::Telemetry {
            boat_id: fleet.boat_id,
            alerts: 0
        }
    );
    assert!(matches!(events.recv().await.unwrap(), RealtimeEvent::Telemetry(_)));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn test_device_ingest_path_shares_alert_policy() {
    let fleet = TestFleet::new();
    let device = fleet.add_device("Helm relay");

    let input = serde_json::from_str(r#"{"key":"battery.voltage","value":"11.9"}"#).unwrap();
    let outcome = fleet
        .telemetry
        .ingest(fleet.boat_id, Some(device.id), &input)
        .unwrap();
    assert_eq!(outcome.alerts.len(), 1);
    assert_eq!(outcome.sample.device_id, Some(device.id));
}

#[test]
fn test_malformed_messages_are_dropped() {
    let fleet = TestFleet::new();
    let device = fleet.add_device("Helm relay");
    fleet.add_channel("Cabin fan", 2);

    let echo = fleet.topic(&format!("device/{}/channel/2", device.id));
    assert_eq!(fleet.inbound.handle(&echo, b"not json"), InboundOutcome::Dropped);

    let telemetry = fleet.topic(&format!("boat/{}/telemetry", fleet.boat_id));
    assert_eq!(fleet.inbound.handle(&telemetry, br#"{"value":1}"#), InboundOutcome::Dropped);

    assert_eq!(fleet.inbound.handle("elsewhere/topic", b"online"), InboundOutcome::Ignored);

    // Still serving afterwards
    let status = fleet.topic(&format!("device/{}/status", device.id));
    assert!(matches!(
        fleet.inbound.handle(&status, b"online"),
        InboundOutcome::Presence { online: true, .. }
    ));
}

#[test]
fn test_duplicate_pin_on_boat_is_conflict() {
    let fleet = TestFleet::new();
    fleet.add_channel("Anchor light", 3);

    let err = fleet
        .channels
        .create(
            fleet.owner,
            &ChannelCreate {
                name: "Deck light".to_string(),
                channel_type: ChannelType::Light,
                pin: 3,
            },
        )
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
    assert_eq!(fleet.channels.list(fleet.owner).unwrap().len(), 1);
}
