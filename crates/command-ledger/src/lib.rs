//! Command Ledger for MarineLink
//!
//! Durable, append-only queue of commands per device. Commands reach devices
//! over two independent paths:
//!
//! - **Retained publish**: on enqueue the ledger hands the envelope to a
//!   [`CommandPublisher`] (the broker bridge). Latest-wins, best effort.
//! - **Pull**: devices poll and [`CommandLedger::claim`] pending rows over
//!   HTTP. Durable and FIFO per device.
//!
//! # Lifecycle
//!
//! A row moves `pending -> dequeued -> acked` and never regresses. Rows are
//! never deleted; they form the audit trail.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use marinelink_core::Database;
//! use marinelink_command_ledger::{CommandLedger, NoopPublisher};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open("data/marinelink.db", 5000)?;
//! let ledger = CommandLedger::new(db, Arc::new(NoopPublisher));
//! # let device_id = uuid::Uuid::new_v4();
//! let batch = ledger.claim(device_id, 10)?;
//! for envelope in &batch {
//!     ledger.ack(device_id, envelope.id)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod command_types;
pub mod ledger;
pub mod publisher;

pub use command_types::{ChannelSet, CommandEnvelope, CommandRecord, CHANNEL_SET};
pub use ledger::{CommandLedger, LedgerError};
pub use publisher::{CommandPublisher, NoopPublisher, PublishError};
