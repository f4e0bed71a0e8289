//! Boat repository. One boat per owner.

use marinelink_core::error::is_unique_violation;
use marinelink_core::store::column_uuid;
use marinelink_core::Database;
use rusqlite::{params, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::error::{DomainError, Result};
use crate::model::{Boat, BoatId, DeviceId, OwnerId};

#[derive(Debug, Clone)]
pub struct BoatRepository {
    db: Database,
}

impl BoatRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register the owner's boat. A second boat for the same owner is a conflict.
    pub fn create(&self, owner_id: OwnerId, name: &str) -> Result<Boat> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::ValidationError("boat name is empty".into()));
        }

        let boat = Boat {
            id: Uuid::new_v4(),
            owner_id,
            name: name.to_string(),
        };

        let conn = self.db.connect()?;
        conn.execute(
            "INSERT INTO boats (id, owner_id, name) VALUES (?1, ?2, ?3)",
            params![boat.id.to_string(), owner_id.to_string(), boat.name],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::Conflict("owner already has a boat".into())
            } else {
                DomainError::DatabaseError(e)
            }
        })?;

        info!(boat_id = %boat.id, owner_id = %owner_id, "Boat registered");
        Ok(boat)
    }

    pub fn find_by_owner(&self, owner_id: OwnerId) -> Result<Option<Boat>> {
        let conn = self.db.connect()?;
        let boat = conn
            .query_row(
                "SELECT id, name FROM boats WHERE owner_id = ?1",
                params![owner_id.to_string()],
                |row| {
                    Ok(Boat {
                        id: column_uuid(row, 0)?,
                        owner_id,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(boat)
    }

    /// The owner's boat, or `NotFound`.
    pub fn require_for_owner(&self, owner_id: OwnerId) -> Result<Boat> {
        self.find_by_owner(owner_id)?
            .ok_or_else(|| DomainError::NotFound("boat".into()))
    }

    pub fn owner_boat_id(&self, owner_id: OwnerId) -> Result<BoatId> {
        Ok(self.require_for_owner(owner_id)?.id)
    }

    pub fn exists(&self, boat_id: BoatId) -> Result<bool> {
        let conn = self.db.connect()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM boats WHERE id = ?1",
                params![boat_id.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// True when `device_id` is registered on `boat_id`.
    pub fn has_device(&self, boat_id: BoatId, device_id: DeviceId) -> Result<bool> {
        let conn = self.db.connect()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM devices WHERE id = ?1 AND boat_id = ?2",
                params![device_id.to_string(), boat_id.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
