//! Core functionality for the MarineLink device command & presence system.
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: configuration, the error taxonomy, logging initialization,
//! the SQLite store and time helpers.

pub mod config;
pub mod error;
pub mod logging;
pub mod store;
pub mod time;

pub use config::{
    AlertConfig, BrokerConfig, Config, CredentialConfig, DatabaseConfig, LogFormat, ServerConfig,
};
pub use error::{CoreError, Result};
pub use store::Database;
