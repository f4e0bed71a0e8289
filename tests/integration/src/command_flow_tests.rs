//! Owner toggle through the durable ledger to device claim and ack.

use std::collections::HashSet;
use std::thread;

use marinelink_command_ledger::{ChannelSet, CHANNEL_SET};
use marinelink_domain::ToggleChannel;
use serde_json::{json, Value};

use crate::test_utils::TestFleet;

#[test]
fn test_claim_returns_queued_command_once() {
    let fleet = TestFleet::new();
    let device = fleet.add_device("Helm relay");

    let id = fleet
        .ledger
        .enqueue(device.id, CHANNEL_SET, &json!({"pin": 3, "state": true}))
        .unwrap();

    let batch = fleet.ledger.claim(device.id, 10).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, id);
    assert_eq!(batch[0].command_type, CHANNEL_SET);
    assert!(batch[0].dequeued_at.is_some());

    let payload: Value = serde_json::from_str(&batch[0].payload_json).unwrap();
    assert_eq!(payload, json!({"pin": 3, "state": true}));

    assert!(fleet.ledger.claim(device.id, 10).unwrap().is_empty());
}

#[test]
fn test_owner_toggle_reaches_every_active_device() {
    let fleet = TestFleet::new();
    let helm = fleet.add_device("Helm relay");
    let cabin = fleet.add_device("Cabin relay");
    let retired = fleet.add_device("Old relay");
    fleet.devices.set_active(retired.id, false).unwrap();

    let channel = fleet.add_channel("Anchor light", 3);
    let toggled = fleet
        .channels
        .toggle(fleet.owner, channel.id, &ToggleChannel { state: Some(true) })
        .unwrap();

    let queued = fleet
        .ledger
        .enqueue_for_boat(
            toggled.boat_id,
            CHANNEL_SET,
            &ChannelSet {
                channel_id: toggled.id,
                pin: toggled.pin,
                state: toggled.state,
            },
        )
        .unwrap();
    assert_eq!(queued.len(), 2);

    for device in [&helm, &cabin] {
        let batch = fleet.ledger.claim(device.id, 10).unwrap();
        assert_eq!(batch.len(), 1);
        let payload: ChannelSet = serde_json::from_str(&batch[0].payload_json).unwrap();
        assert_eq!(payload.pin, 3);
        assert!(payload.state);
    }
    assert!(fleet.ledger.claim(retired.id, 10).unwrap().is_empty());

    // Live push attempted for each committed row
    let pushed: HashSet<_> = fleet.publisher.published().into_iter().map(|(d, _)| d).collect();
    assert_eq!(pushed, HashSet::from([helm.id, cabin.id]));
}

#[test]
fn test_repeated_ack_is_success_and_leaves_row_unchanged() {
    let fleet = TestFleet::new();
    let device = fleet.add_device("Helm relay");

    let id = fleet
        .ledger
        .enqueue(device.id, CHANNEL_SET, &json!({"pin": 1, "state": false}))
        .unwrap();
    fleet.ledger.claim(device.id, 10).unwrap();

    fleet.ledger.ack(device.id, id).unwrap();
    let first = fleet.ledger.get(id).unwrap().unwrap();

    fleet.ledger.ack(device.id, id).unwrap();
    let second = fleet.ledger.get(id).unwrap().unwrap();

    assert!(first.acked_at.is_some());
    assert_eq!(first.acked_at, second.acked_at);
    assert_eq!(first.envelope.dequeued_at, second.envelope.dequeued_at);

    // Every ack clears the retained command
    assert_eq!(fleet.publisher.cleared(), vec![device.id, device.id]);
}

#[test]
fn test_ack_from_other_device_changes_nothing() {
    let fleet = TestFleet::new();
    let helm = fleet.add_device("Helm relay");
    let cabin = fleet.add_device("Cabin relay");

    let id = fleet
        .ledger
        .enqueue(helm.id, CHANNEL_SET, &json!({"pin": 1, "state": true}))
        .unwrap();

    assert!(!fleet.ledger.ack(cabin.id, id).unwrap());
    assert!(fleet.ledger.get(id).unwrap().unwrap().is_pending());
    assert!(fleet.publisher.cleared().is_empty());
}

#[test]
fn test_concurrent_claims_are_disjoint_and_complete() {
    let fleet = TestFleet::new();
    let device = fleet.add_device("Helm relay");

    let mut pending = HashSet::new();
    for pin in 0..40 {
        let id = fleet
            .ledger
            .enqueue(device.id, CHANNEL_SET, &json!({"pin": pin, "state": true}))
            .unwrap();
        pending.insert(id);
    }

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let ledger = fleet.ledger.clone();
            let device_id = device.id;
            thread::spawn(move || {
                let mut claimed = Vec::new();
                loop {
                    let batch = ledger.claim(device_id, 7).unwrap();
                    if batch.is_empty() {
                        break;
                    }
                    claimed.extend(batch.into_iter().map(|e| e.id));
                }
                claimed
            })
        })
        .collect();

    let results: Vec<Vec<i64>> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    let first: HashSet<_> = results[0].iter().copied().collect();
    let second: HashSet<_> = results[1].iter().copied().collect();
    assert!(first.is_disjoint(&second));
    assert_eq!(first.len() + second.len(), results[0].len() + results[1].len());

    let union: HashSet<_> = first.union(&second).copied().collect();
    assert_eq!(union, pending);
    assert_eq!(fleet.ledger.pending_count(device.id).unwrap(), 0);
}
