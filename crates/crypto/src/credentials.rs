//! Device Credential Store: symmetric key lifecycle with ChaCha20-Poly1305.
//!
//! Device keys are random secrets handed to the owner exactly once (at device
//! creation or rotation) and persisted only in protected form:
//!
//! ```text
//! v1.<epoch>.<base64url(nonce || ciphertext || tag)>
//! ```
//!
//! The master key epoch and a fixed purpose string are bound into the AEAD
//! associated data, so a ciphertext produced under another epoch or tampered
//! with in any byte fails with [`CredentialError::CorruptCredential`].
//!
//! # Rotation
//!
//! Rotation is a plain overwrite of the stored ciphertext. There is no grace
//! window: once the new row commits, requests signed with the old key fail.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use marinelink_core::CoreError;

/// Random bytes behind each device key (256 bits).
const DEVICE_KEY_BYTES: usize = 32;

/// Nonce size for ChaCha20-Poly1305 (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

const FORMAT_VERSION: &str = "v1";

const PURPOSE: &[u8] = b"marinelink/devicekey/v1";

/// Credential store errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Ciphertext tampered with, malformed, or produced under another master key epoch
    #[error("corrupt credential")]
    CorruptCredential,

    #[error("invalid master key: {0}")]
    InvalidMasterKey(String),

    #[error("encryption failed")]
    Encryption,
}

impl From<CredentialError> for CoreError {
    fn from(err: CredentialError) -> Self {
        match err {
            // Fail closed: a key we cannot read never authenticates anything
            CredentialError::CorruptCredential => CoreError::Unauthenticated,
            other => CoreError::Transient(other.to_string()),
        }
    }
}

/// Process-wide master key, supplied by the key-management collaborator.
pub struct MasterKey {
    epoch: u32,
    key: Zeroizing<[u8; 32]>,
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; 32], epoch: u32) -> Self {
        Self {
            epoch,
            key: Zeroizing::new(bytes),
        }
    }

    /// Parse a 64-character hex master key.
    pub fn from_hex(key_hex: &str, epoch: u32) -> Result<Self, CredentialError> {
        let mut decoded = hex::decode(key_hex.trim())
            .map_err(|_| CredentialError::InvalidMasterKey("not valid hex".to_string()))?;

        if decoded.len() != 32 {
            let len = decoded.len();
            decoded.zeroize();
            return Err(CredentialError::InvalidMasterKey(format!(
                "expected 32 bytes, got {}",
                len
            )));
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self::from_bytes(bytes, epoch))
    }

    /// Fresh random master key (tests, first-run provisioning).
    pub fn generate(epoch: u32) -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(bytes, epoch)
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

/// Plaintext device key. Zeroized on drop, never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceKey(Zeroizing<String>);

impl DeviceKey {
    pub fn new(plaintext: impl Into<String>) -> Self {
        Self(Zeroizing::new(plaintext.into()))
    }

    /// The secret as handed to the device. HMAC keys are its UTF-8 bytes.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// BLAKE3 fingerprint, safe to store and log.
    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(self.0.as_bytes());
        hex::encode(&hash.as_bytes()[..8])
    }
}

impl std::fmt::Debug for DeviceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceKey({})", self.fingerprint())
    }
}

/// Generates, protects and unprotects device keys.
pub struct CredentialStore {
    cipher: ChaCha20Poly1305,
    epoch: u32,
}

impl CredentialStore {
    pub fn new(master: MasterKey) -> Self {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&master.key[..]));
        Self {
            cipher,
            epoch: master.epoch,
        }
    }

    /// Master key epoch this store encrypts under.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Cryptographically random device secret, URL-safe base64 (43 chars).
    pub fn generate_key(&self) -> DeviceKey {
        let mut raw = Zeroizing::new([0u8; DEVICE_KEY_BYTES]);
        OsRng.fill_bytes(&mut raw[..]);
        DeviceKey::new(URL_SAFE_NO_PAD.encode(&raw[..]))
    }

    /// Encrypt a device key for storage.
    pub fn protect(&self, key: &DeviceKey) -> Result<String, CredentialError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let aad = Self::associated_data(self.epoch);
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: key.as_bytes(),
                    aad: &aad,
                },
            )
            .map_err(|_| CredentialError::Encryption)?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(format!(
            "{}.{}.{}",
            FORMAT_VERSION,
            self.epoch,
            URL_SAFE_NO_PAD.encode(blob)
        ))
    }

    /// Decrypt a stored device key.
    pub fn unprotect(&self, protected: &str) -> Result<DeviceKey, CredentialError> {
        let mut parts = protected.splitn(3, '.');
        let (Some(version), Some(epoch), Some(body)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CredentialError::CorruptCredential);
        };

        if version != FORMAT_VERSION {
            return Err(CredentialError::CorruptCredential);
        }

        let epoch: u32 = epoch.parse().map_err(|_| CredentialError::CorruptCredential)?;
        if epoch != self.epoch {
            return Err(CredentialError::CorruptCredential);
        }

        let blob = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| CredentialError::CorruptCredential)?;
        if blob.len() <= NONCE_SIZE {
            return Err(CredentialError::CorruptCredential);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);

        let aad = Self::associated_data(epoch);
        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt(
                    Nonce::from_slice(nonce),
                    Payload {
                        msg: ciphertext,
                        aad: &aad,
                    },
                )
                .map_err(|_| CredentialError::CorruptCredential)?,
        );

        let text =
            std::str::from_utf8(&plaintext).map_err(|_| CredentialError::CorruptCredential)?;
        Ok(DeviceKey::new(text))
    }

    fn associated_data(epoch: u32) -> Vec<u8> {
        let mut aad = Vec::with_capacity(PURPOSE.len() + 4);
        aad.extend_from_slice(PURPOSE);
        aad.extend_from_slice(&epoch.to_be_bytes());
        aad
    }
}
