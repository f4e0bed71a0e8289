//! Durable command queue per device
//!
//! Backed by the `device_commands` table. Every operation opens its own
//! connection; [`CommandLedger::claim`] takes the write lock before reading
//! so that concurrent pollers for one device never receive the same row.

#![warn(missing_docs)]

use std::sync::Arc;

use marinelink_core::store::column_uuid;
use marinelink_core::time::{from_ms, now_ms};
use marinelink_core::{CoreError, Database};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command_types::{CommandEnvelope, CommandRecord};
use crate::publisher::CommandPublisher;

/// Command ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Target device does not exist
    #[error("Device not found: {0}")]
    DeviceNotFound(Uuid),

    /// Payload could not be serialized
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Database operation failed
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Store could not be reached
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<LedgerError> for CoreError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DeviceNotFound(_) => CoreError::NotFound("device".into()),
            LedgerError::SerializationError(e) => CoreError::InvalidPayload(e.to_string()),
            LedgerError::DatabaseError(e) => CoreError::from(e),
            LedgerError::Core(e) => e,
        }
    }
}

/// Result alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

const ENVELOPE_COLUMNS: &str = "id, type, payload_json, created_ms, dequeued_ms";

fn envelope_from_row(row: &Row<'_>) -> rusqlite::Result<CommandEnvelope> {
    let dequeued: Option<i64> = row.get(4)?;
    Ok(CommandEnvelope {
        id: row.get(0)?,
        command_type: row.get(1)?,
        payload_json: row.get(2)?,
        created_at: from_ms(row.get(3)?),
        dequeued_at: dequeued.map(from_ms),
    })
}

/// Command ledger with a best-effort live-push side channel
#[derive(Clone)]
pub struct CommandLedger {
    db: Database,
    publisher: Arc<dyn CommandPublisher>,
}

impl CommandLedger {
    /// Create a ledger over `db` that pushes new commands through `publisher`
    pub fn new(db: Database, publisher: Arc<dyn CommandPublisher>) -> Self {
        Self { db, publisher }
    }

    /// Insert a pending command for `device_id` and return its id.
    ///
    /// The retained publish happens after the row commits. Its failure is
    /// logged and the row stays pollable.
    pub fn enqueue<P: Serialize + ?Sized>(
        &self,
        device_id: Uuid,
        command_type: &str,
        payload: &P,
    ) -> Result<i64> {
        let payload_json = serde_json::to_string(payload)?;
        let conn = self.db.connect()?;

        let exists = conn
            .query_row(
                "SELECT 1 FROM devices WHERE id = ?1",
                params![device_id.to_string()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Err(LedgerError::DeviceNotFound(device_id));
        }

        let envelope = Self::insert(&conn, device_id, command_type, &payload_json)?;
        info!(
            device_id = %device_id,
            command_id = envelope.id,
            command_type = %command_type,
            "Command enqueued"
        );

        self.push(device_id, &envelope);
        Ok(envelope.id)
    }

    /// Enqueue the same command for every active device on a boat.
    ///
    /// A boat without active devices is a no-op and returns no ids.
    pub fn enqueue_for_boat<P: Serialize + ?Sized>(
        &self,
        boat_id: Uuid,
        command_type: &str,
        payload: &P,
    ) -> Result<Vec<i64>> {
        let payload_json = serde_json::to_string(payload)?;
        let mut conn = self.db.connect()?;

        let device_ids = {
            let mut stmt = conn.prepare(
                "SELECT id FROM devices WHERE boat_id = ?1 AND is_active = 1 ORDER BY id",
            )?;
            let ids = stmt
                .query_map(params![boat_id.to_string()], |row| column_uuid(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };

        if device_ids.is_empty() {
            debug!(boat_id = %boat_id, "No active devices, nothing enqueued");
            return Ok(Vec::new());
        }

        let tx = conn.transaction()?;
        let mut queued = Vec::with_capacity(device_ids.len());
        for device_id in device_ids {
            let envelope = Self::insert(&tx, device_id, command_type, &payload_json)?;
            queued.push((device_id, envelope));
        }
        tx.commit()?;

        info!(
            boat_id = %boat_id,
            command_type = %command_type,
            devices = queued.len(),
            "Command enqueued for boat"
        );

        for (device_id, envelope) in &queued {
            self.push(*device_id, envelope);
        }
        Ok(queued.into_iter().map(|(_, e)| e.id).collect())
    }

    /// Atomically take up to `max` pending commands for `device_id`, oldest
    /// first, stamping them as dequeued.
    ///
    /// Returns an empty batch when nothing is pending.
    pub fn claim(&self, device_id: Uuid, max: usize) -> Result<Vec<CommandEnvelope>> {
        if max == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.db.connect()?;
        // IMMEDIATE: the write lock is held from the SELECT on
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let pending = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM device_commands
                 WHERE device_id = ?1 AND dequeued_ms IS NULL AND acked_ms IS NULL
                 ORDER BY id ASC
                 LIMIT ?2",
                ENVELOPE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    params![device_id.to_string(), max as i64],
                    envelope_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let claimed_ms = now_ms();
        let mut batch = Vec::with_capacity(pending.len());
        for mut envelope in pending {
            let stamped = tx.execute(
                "UPDATE device_commands SET dequeued_ms = ?1
                 WHERE id = ?2 AND dequeued_ms IS NULL AND acked_ms IS NULL",
                params![claimed_ms, envelope.id],
            )?;
            if stamped == 1 {
                envelope.dequeued_at = Some(from_ms(claimed_ms));
                batch.push(envelope);
            }
        }
        tx.commit()?;

        if !batch.is_empty() {
            debug!(device_id = %device_id, count = batch.len(), "Commands claimed");
        }
        Ok(batch)
    }

    /// Acknowledge a command.
    ///
    /// Unknown ids, ids of another device and repeated acks are silent
    /// no-ops. Returns whether this call performed the transition.
    pub fn ack(&self, device_id: Uuid, command_id: i64) -> Result<bool> {
        let conn = self.db.connect()?;

        let belongs = conn
            .query_row(
                "SELECT 1 FROM device_commands WHERE id = ?1 AND device_id = ?2",
                params![command_id, device_id.to_string()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !belongs {
            debug!(device_id = %device_id, command_id, "Ack for unknown command ignored");
            return Ok(false);
        }

        let acked = conn.execute(
            "UPDATE device_commands SET acked_ms = ?1
             WHERE id = ?2 AND device_id = ?3 AND acked_ms IS NULL",
            params![now_ms(), command_id, device_id.to_string()],
        )? == 1;

        if acked {
            info!(device_id = %device_id, command_id, "Command acknowledged");
        }

        // Repeated acks clear again in case the first clear never reached the broker
        if let Err(e) = self.publisher.clear_retained(device_id) {
            warn!(device_id = %device_id, error = %e, "Retained clear failed");
        }

        Ok(acked)
    }

    /// Load one ledger row
    pub fn get(&self, command_id: i64) -> Result<Option<CommandRecord>> {
        let conn = self.db.connect()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {}, device_id, acked_ms FROM device_commands WHERE id = ?1",
                    ENVELOPE_COLUMNS
                ),
                params![command_id],
                |row| {
                    let acked: Option<i64> = row.get(6)?;
                    Ok(CommandRecord {
                        envelope: envelope_from_row(row)?,
                        device_id: column_uuid(row, 5)?,
                        acked_at: acked.map(from_ms),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Number of commands still waiting to be claimed by `device_id`
    pub fn pending_count(&self, device_id: Uuid) -> Result<u64> {
        let conn = self.db.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM device_commands
             WHERE device_id = ?1 AND dequeued_ms IS NULL AND acked_ms IS NULL",
            params![device_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn insert(
        conn: &Connection,
        device_id: Uuid,
        command_type: &str,
        payload_json: &str,
    ) -> Result<CommandEnvelope> {
        let created_ms = now_ms();
        conn.execute(
            "INSERT INTO device_commands (device_id, type, payload_json, created_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![device_id.to_string(), command_type, payload_json, created_ms],
        )?;

        Ok(CommandEnvelope {
            id: conn.last_insert_rowid(),
            command_type: command_type.to_string(),
            payload_json: payload_json.to_string(),
            created_at: from_ms(created_ms),
            dequeued_at: None,
        })
    }

    fn push(&self, device_id: Uuid, envelope: &CommandEnvelope) {
        if let Err(e) = self.publisher.publish(device_id, envelope) {
            warn!(
                device_id = %device_id,
                command_id = envelope.id,
                error = %e,
                "Live push failed, command remains pollable"
            );
        }
    }
}
