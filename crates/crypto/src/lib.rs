//! Cryptographic primitives for MarineLink device authentication.
//!
//! Field devices hold a single shared symmetric secret. This crate provides:
//!
//! - **Device Credential Store**: key generation, encryption at rest under a
//!   process-wide master key (ChaCha20-Poly1305), decryption for verification
//! - **Message Authentication**: HMAC-SHA256 over raw request bytes with
//!   constant-time verification
//!
//! # Security Principles
//!
//! - Plaintext device keys exist only in memory and are zeroized on drop
//! - Secrets and signatures must never be logged
//! - Verification never short-circuits on the first differing byte

pub mod credentials;
pub mod mac;

pub use credentials::{CredentialError, CredentialStore, DeviceKey, MasterKey};
pub use mac::{ack_signing_string, compute_hex, verify_hex};
