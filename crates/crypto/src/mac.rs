//! HMAC-SHA256 request signatures.
//!
//! Devices sign the exact bytes they send. The server recomputes the MAC over
//! the raw body it received (never a re-serialized form) and compares in
//! constant time.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn keyed(key: &[u8], body: &[u8]) -> Result<HmacSha256, InvalidLength> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)?;
    mac.update(body);
    Ok(mac)
}

/// Lowercase hex HMAC-SHA256 of `body` under `key`.
pub fn compute_hex(key: &[u8], body: &[u8]) -> Result<String, InvalidLength> {
    Ok(hex::encode(keyed(key, body)?.finalize().into_bytes()))
}

/// Verify a hex signature (either case) over `body`.
///
/// Malformed hex or a wrong-length tag is simply a failed verification.
pub fn verify_hex(key: &[u8], body: &[u8], signature_hex: &str) -> bool {
    let Ok(tag) = hex::decode(signature_hex.trim()) else {
        return false;
    };

    match keyed(key, body) {
        // verify_slice compares in constant time and rejects wrong lengths
        Ok(mac) => mac.verify_slice(&tag).is_ok(),
        Err(_) => false,
    }
}

/// The canonical string a device signs when acknowledging a command.
///
/// Only the command id is covered, not the request body.
pub fn ack_signing_string(command_id: i64) -> String {
    format!("{{\"id\":{}}}", command_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc4231_case_2() {
        let mac = compute_hex(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            mac,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_accepts_upper_and_lower_hex() {
        let sig = compute_hex(b"key", b"body").unwrap();
        assert!(verify_hex(b"key", b"body", &sig));
        assert!(verify_hex(b"key", b"body", &sig.to_uppercase()));
    }

    #[test]
    fn test_verify_rejects_wrong_key_or_body() {
        let sig = compute_hex(b"key-a", b"body").unwrap();
        assert!(!verify_hex(b"key-b", b"body", &sig));
        assert!(!verify_hex(b"key-a", b"body ", &sig));
    }

    #[test]
    fn test_verify_rejects_malformed_signature() {
        assert!(!verify_hex(b"key", b"body", ""));
        assert!(!verify_hex(b"key", b"body", "not-hex"));
        assert!(!verify_hex(b"key", b"body", "abcd"));
    }

    #[test]
    fn test_empty_and_long_keys_are_accepted() {
        let long_key = [7u8; 200];
        for key in [&b""[..], &long_key[..]] {
            let sig = compute_hex(key, b"body").unwrap();
            assert_eq!(sig.len(), 64);
            assert!(verify_hex(key, b"body", &sig));
        }
    }

    #[test]
    fn test_ack_signing_string() {
        assert_eq!(ack_signing_string(42), r#"{"id":42}"#);
    }
}
