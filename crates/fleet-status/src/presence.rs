//! Presence Tracker
//!
//! Device presence changes only through explicit status messages. There is
//! no expiry: a device that goes silent without reporting offline stays
//! online until something external marks it otherwise.

use marinelink_core::time::{from_ms, now_ms};
use marinelink_core::Database;
use marinelink_domain::{BoatId, BoatStatus, DeviceId};
use rusqlite::params;
use tracing::{debug, info};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PresenceTracker {
    db: Database,
}

impl PresenceTracker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a status report. `last_seen` is stamped in both directions.
    ///
    /// Returns false when the device is unknown.
    pub fn set_online(&self, device_id: DeviceId, online: bool) -> Result<bool> {
        let conn = self.db.connect()?;
        let updated = conn.execute(
            "UPDATE devices SET is_online = ?1, last_seen_ms = ?2 WHERE id = ?3",
            params![online, now_ms(), device_id.to_string()],
        )?;

        if updated == 0 {
            debug!(device_id = %device_id, "Status for unknown device ignored");
            return Ok(false);
        }

        info!(device_id = %device_id, online, "Device presence updated");
        Ok(true)
    }

    /// Boat aggregate: online if any device is, last seen is the latest
    /// contact over all devices.
    pub fn boat_status(&self, boat_id: BoatId) -> Result<BoatStatus> {
        let conn = self.db.connect()?;
        let (online, last_seen): (i64, Option<i64>) = conn.query_row(
            "SELECT COALESCE(MAX(is_online), 0), MAX(last_seen_ms)
             FROM devices WHERE boat_id = ?1",
            params![boat_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(BoatStatus {
            online: online != 0,
            last_seen_utc: last_seen.map(from_ms),
        })
    }
}
