//! Device registry
//!
//! Creates devices under the owner's boat and rotates their keys. The
//! plaintext key leaves this module exactly once per create/rotate, as the
//! returned [`DeviceKey`]; only the protected form and a BLAKE3 fingerprint
//! are stored.

use std::sync::Arc;

use marinelink_core::store::column_uuid;
use marinelink_core::time::{from_ms, now_ms};
use marinelink_core::Database;
use marinelink_crypto::{CredentialStore, DeviceKey};
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use crate::boats::BoatRepository;
use crate::error::{DomainError, Result};
use crate::model::{BoatId, DeviceId, DeviceSummary, OwnerId};

const SUMMARY_COLUMNS: &str = "id, boat_id, name, is_active, is_online, last_seen_ms";

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<DeviceSummary> {
    let last_seen: Option<i64> = row.get(5)?;
    Ok(DeviceSummary {
        id: column_uuid(row, 0)?,
        boat_id: column_uuid(row, 1)?,
        name: row.get(2)?,
        is_active: row.get(3)?,
        is_online: row.get(4)?,
        last_seen_utc: last_seen.map(from_ms),
    })
}

/// Stored credential material of one device, as needed for verification.
#[derive(Debug, Clone)]
pub struct DeviceCredential {
    pub device_id: DeviceId,
    pub boat_id: BoatId,
    pub is_active: bool,
    pub key_protected: String,
}

#[derive(Clone)]
pub struct DeviceRegistry {
    db: Database,
    boats: BoatRepository,
    credentials: Arc<CredentialStore>,
}

impl DeviceRegistry {
    pub fn new(db: Database, credentials: Arc<CredentialStore>) -> Self {
        Self {
            boats: BoatRepository::new(db.clone()),
            db,
            credentials,
        }
    }

    /// Create an active device on the owner's boat.
    ///
    /// Returns the plaintext key; it cannot be recovered later.
    pub fn create(&self, owner_id: OwnerId, name: &str) -> Result<(DeviceSummary, DeviceKey)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::ValidationError("device name is empty".into()));
        }

        let boat_id = self.boats.owner_boat_id(owner_id)?;
        let key = self.credentials.generate_key();
        let protected = self.credentials.protect(&key)?;

        let device = DeviceSummary {
            id: Uuid::new_v4(),
            boat_id,
            name: name.to_string(),
            is_active: true,
            is_online: false,
            last_seen_utc: None,
        };

        let conn = self.db.connect()?;
        conn.execute(
            "INSERT INTO devices (id, boat_id, name, key_hash, key_protected, is_active, is_online, created_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, 0, ?6)",
            params![
                device.id.to_string(),
                boat_id.to_string(),
                device.name,
                key.fingerprint(),
                protected,
                now_ms(),
            ],
        )?;

        info!(
            device_id = %device.id,
            boat_id = %boat_id,
            key_fp = %key.fingerprint(),
            "Device created"
        );

        Ok((device, key))
    }

    /// Devices on the owner's boat, by name.
    pub fn list(&self, owner_id: OwnerId) -> Result<Vec<DeviceSummary>> {
        let boat_id = self.boats.owner_boat_id(owner_id)?;
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM devices WHERE boat_id = ?1 ORDER BY name, id",
            SUMMARY_COLUMNS
        ))?;
        let devices = stmt
            .query_map(params![boat_id.to_string()], summary_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(devices)
    }

    pub fn find(&self, device_id: DeviceId) -> Result<Option<DeviceSummary>> {
        let conn = self.db.connect()?;
        let device = conn
            .query_row(
                &format!("SELECT {} FROM devices WHERE id = ?1", SUMMARY_COLUMNS),
                params![device_id.to_string()],
                summary_from_row,
            )
            .optional()?;
        Ok(device)
    }

    /// Replace the device key. The previous key stops verifying as soon as
    /// the update commits.
    ///
    /// A device on another owner's boat is reported as `NotFound`.
    pub fn rotate_key(&self, owner_id: OwnerId, device_id: DeviceId) -> Result<DeviceKey> {
        let key = self.credentials.generate_key();
        let protected = self.credentials.protect(&key)?;

        let conn = self.db.connect()?;
        let updated = conn.execute(
            "UPDATE devices SET key_protected = ?1, key_hash = ?2
             WHERE id = ?3
               AND boat_id IN (SELECT id FROM boats WHERE owner_id = ?4)",
            params![
                protected,
                key.fingerprint(),
                device_id.to_string(),
                owner_id.to_string(),
            ],
        )?;

        if updated == 0 {
            return Err(DomainError::NotFound("device".into()));
        }

        info!(device_id = %device_id, key_fp = %key.fingerprint(), "Device key rotated");
        Ok(key)
    }

    /// Enable or disable a device. Inactive devices fail authentication and
    /// receive no boat-wide commands.
    pub fn set_active(&self, device_id: DeviceId, active: bool) -> Result<()> {
        let conn = self.db.connect()?;
        let updated = conn.execute(
            "UPDATE devices SET is_active = ?1 WHERE id = ?2",
            params![active, device_id.to_string()],
        )?;
        if updated == 0 {
            return Err(DomainError::NotFound("device".into()));
        }
        Ok(())
    }

    /// Protected key and status of a device, for the request authenticator.
    pub fn credential(&self, device_id: DeviceId) -> Result<Option<DeviceCredential>> {
        let conn = self.db.connect()?;
        let credential = conn
            .query_row(
                "SELECT boat_id, is_active, key_protected FROM devices WHERE id = ?1",
                params![device_id.to_string()],
                |row| {
                    Ok(DeviceCredential {
                        device_id,
                        boat_id: column_uuid(row, 0)?,
                        is_active: row.get(1)?,
                        key_protected: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(credential)
    }

    pub fn credential_store(&self) -> &CredentialStore {
        &self.credentials
    }
}
