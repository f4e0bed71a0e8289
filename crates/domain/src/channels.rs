//! Channel repository
//!
//! Channel `state` has two writers: owner toggles and device state echoes
//! arriving over the broker. Both are plain last-writer-wins updates with no
//! version check; the physical device is the authority and its next echo
//! settles any race.

use marinelink_core::error::is_unique_violation;
use marinelink_core::store::column_uuid;
use marinelink_core::Database;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::boats::BoatRepository;
use crate::error::{DomainError, Result};
use crate::model::{Channel, ChannelCreate, ChannelId, ChannelType, DeviceId, OwnerId, ToggleChannel};

const CHANNEL_COLUMNS: &str = "id, boat_id, name, channel_type, pin, state";

fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<Channel> {
    let type_text: String = row.get(3)?;
    let channel_type = ChannelType::parse(&type_text).unwrap_or(ChannelType::Aux);
    Ok(Channel {
        id: column_uuid(row, 0)?,
        boat_id: column_uuid(row, 1)?,
        name: row.get(2)?,
        channel_type,
        pin: row.get(4)?,
        state: row.get(5)?,
    })
}

#[derive(Debug, Clone)]
pub struct ChannelRepository {
    db: Database,
    boats: BoatRepository,
}

impl ChannelRepository {
    pub fn new(db: Database) -> Self {
        Self {
            boats: BoatRepository::new(db.clone()),
            db,
        }
    }

    /// Add a channel to the owner's boat. The pin must be free on that boat.
    pub fn create(&self, owner_id: OwnerId, req: &ChannelCreate) -> Result<Channel> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(DomainError::ValidationError("channel name is empty".into()));
        }
        if req.pin < 0 {
            return Err(DomainError::ValidationError("pin must not be negative".into()));
        }

        let boat_id = self.boats.owner_boat_id(owner_id)?;
        let channel = Channel {
            id: Uuid::new_v4(),
            boat_id,
            name: name.to_string(),
            channel_type: req.channel_type,
            pin: req.pin,
            state: false,
        };

        let conn = self.db.connect()?;
        conn.execute(
            "INSERT INTO channels (id, boat_id, name, channel_type, pin, state)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                channel.id.to_string(),
                boat_id.to_string(),
                channel.name,
                channel.channel_type.as_str(),
                channel.pin,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::Conflict(format!("pin {} already in use", req.pin))
            } else {
                DomainError::DatabaseError(e)
            }
        })?;

        info!(channel_id = %channel.id, boat_id = %boat_id, pin = channel.pin, "Channel created");
        Ok(channel)
    }

    /// Channels on the owner's boat, by pin.
    pub fn list(&self, owner_id: OwnerId) -> Result<Vec<Channel>> {
        let boat_id = self.boats.owner_boat_id(owner_id)?;
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM channels WHERE boat_id = ?1 ORDER BY pin",
            CHANNEL_COLUMNS
        ))?;
        let channels = stmt
            .query_map(params![boat_id.to_string()], channel_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(channels)
    }

    /// Set or flip a channel on the owner's boat and return its new state.
    ///
    /// Read and write share one IMMEDIATE transaction so two concurrent flips
    /// do not both read the same starting state.
    pub fn toggle(
        &self,
        owner_id: OwnerId,
        channel_id: ChannelId,
        req: &ToggleChannel,
    ) -> Result<Channel> {
        let mut conn = self.db.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut channel = tx
            .query_row(
                &format!(
                    "SELECT {} FROM channels
                     WHERE id = ?1 AND boat_id IN (SELECT id FROM boats WHERE owner_id = ?2)",
                    CHANNEL_COLUMNS
                ),
                params![channel_id.to_string(), owner_id.to_string()],
                channel_from_row,
            )
            .optional()?
            .ok_or_else(|| DomainError::NotFound("channel".into()))?;

        channel.state = req.state.unwrap_or(!channel.state);
        tx.execute(
            "UPDATE channels SET state = ?1 WHERE id = ?2",
            params![channel.state, channel_id.to_string()],
        )?;
        tx.commit()?;

        info!(channel_id = %channel_id, pin = channel.pin, state = channel.state, "Channel toggled");
        Ok(channel)
    }

    /// Apply a state echo reported by a device for one of its boat's pins.
    ///
    /// Returns `None` when the device is unknown or its boat has no channel on
    /// that pin.
    pub fn apply_device_echo(
        &self,
        device_id: DeviceId,
        pin: i32,
        state: bool,
    ) -> Result<Option<Channel>> {
        let conn = self.db.connect()?;
        let updated = conn.execute(
            "UPDATE channels SET state = ?1
             WHERE pin = ?2 AND boat_id = (SELECT boat_id FROM devices WHERE id = ?3)",
            params![state, pin, device_id.to_string()],
        )?;

        if updated == 0 {
            debug!(device_id = %device_id, pin, "State echo matched no channel");
            return Ok(None);
        }

        let channel = conn
            .query_row(
                &format!(
                    "SELECT {} FROM channels
                     WHERE pin = ?1 AND boat_id = (SELECT boat_id FROM devices WHERE id = ?2)",
                    CHANNEL_COLUMNS
                ),
                params![pin, device_id.to_string()],
                channel_from_row,
            )
            .optional()?;
        Ok(channel)
    }
}
