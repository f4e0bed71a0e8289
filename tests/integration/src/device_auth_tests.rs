//! Device request authentication and credential protection.

use marinelink_crypto::{ack_signing_string, CredentialError, CredentialStore, MasterKey};
use marinelink_domain::DomainError;

use crate::test_utils::TestFleet;

#[test]
fn test_signature_is_bound_to_the_signing_device() {
    let fleet = TestFleet::new();
    let helm = fleet.add_device("Helm relay");
    let cabin = fleet.add_device("Cabin relay");

    let body = br#"{"max":5}"#;
    let signature = helm.sign(body);

    let verified = fleet.authenticator.verify(body, &signature, helm.id).unwrap();
    assert_eq!(verified.device_id, helm.id);
    assert_eq!(verified.boat_id, fleet.boat_id);

    // Same bytes, same signature, other device
    let err = fleet.authenticator.verify(body, &signature, cabin.id).unwrap_err();
    assert!(matches!(err, DomainError::Unauthenticated));
}

#[test]
fn test_rejections_are_indistinguishable() {
    let fleet = TestFleet::new();
    let device = fleet.add_device("Helm relay");
    let body = b"{}";

    let unknown = fleet
        .authenticator
        .verify(body, &device.sign(body), uuid::Uuid::new_v4())
        .unwrap_err();
    let tampered = fleet
        .authenticator
        .verify(b"{ }", &device.sign(body), device.id)
        .unwrap_err();

    fleet.devices.set_active(device.id, false).unwrap();
    let inactive = fleet
        .authenticator
        .verify(body, &device.sign(body), device.id)
        .unwrap_err();

    for err in [unknown, tampered, inactive] {
        assert!(matches!(err, DomainError::Unauthenticated));
        assert_eq!(err.to_string(), DomainError::Unauthenticated.to_string());
    }
}

#[test]
fn test_rotation_invalidates_previous_key() {
    let fleet = TestFleet::new();
    let device = fleet.add_device("Helm relay");
    let body = b"{}";
    let old_signature = device.sign(body);

    let new_key = fleet.devices.rotate_key(fleet.owner, device.id).unwrap();
    assert_ne!(new_key.expose(), device.key.expose());

    assert!(fleet.authenticator.verify(body, &old_signature, device.id).is_err());
    let new_signature = marinelink_crypto::compute_hex(new_key.as_bytes(), body).unwrap();
    assert!(fleet.authenticator.verify(body, &new_signature, device.id).is_ok());
}

#[test]
fn test_ack_signature_covers_canonical_id() {
    let fleet = TestFleet::new();
    let device = fleet.add_device("Helm relay");

    let signature = device.sign(ack_signing_string(42).as_bytes());
    assert!(fleet.authenticator.verify_ack(device.id, 42, &signature).is_ok());
    assert!(fleet.authenticator.verify_ack(device.id, 43, &signature).is_err());
}

#[test]
fn test_protected_key_round_trips() {
    let store = CredentialStore::new(MasterKey::generate(1));
    for _ in 0..8 {
        let key = store.generate_key();
        let protected = store.protect(&key).unwrap();
        assert!(!protected.contains(key.expose()));
        assert_eq!(store.unprotect(&protected).unwrap().expose(), key.expose());
    }
}

#[test]
fn test_corrupted_key_fails_closed() {
    let store = CredentialStore::new(MasterKey::generate(1));
    let protected = store.protect(&store.generate_key()).unwrap();

    let mut chars: Vec<char> = protected.chars().collect();
    let idx = chars.len() / 2 + 4;
    chars[idx] = if chars[idx] == 'A' { 'B' } else { 'A' };
    let corrupted: String = chars.into_iter().collect();

    assert!(matches!(
        store.unprotect(&corrupted),
        Err(CredentialError::CorruptCredential)
    ));

    // Another master key cannot read it either
    let other = CredentialStore::new(MasterKey::generate(1));
    assert!(matches!(
        other.unprotect(&protected),
        Err(CredentialError::CorruptCredential)
    ));
}
