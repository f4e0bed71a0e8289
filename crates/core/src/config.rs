//! Configuration management for MarineLink.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub credentials: CredentialConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_addr: String,
    pub ws_addr: String,
    pub max_body_bytes: usize,
    /// Upper bound of envelopes returned by one pull-commands call
    pub pull_batch_size: usize,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            ws_addr: "0.0.0.0:8081".to_string(),
            max_body_bytes: 65536,
            pull_batch_size: 20,
            log_format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/marinelink.db"),
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Prefix; a random suffix is appended for every connection attempt
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub base_topic: String,
    pub keep_alive_secs: u64,
    pub reconnect_backoff_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: "marinelink-api".to_string(),
            username: None,
            password: None,
            base_topic: "itechmarine".to_string(),
            keep_alive_secs: 30,
            reconnect_backoff_secs: 5,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// 32-byte master key, hex encoded. Never logged.
    pub master_key_hex: String,
    pub key_epoch: u32,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("master_key_hex", &"<redacted>")
            .field("key_epoch", &self.key_epoch)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub battery_low_voltage: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            battery_low_voltage: 12.0,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CoreError::InvalidPayload(format!("config: {}", e)))
    }

    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            broker: BrokerConfig::default(),
            credentials: CredentialConfig::default(),
            alerts: AlertConfig::default(),
        }
    }

    /// Overlay `MARINELINK_*` environment variables onto this configuration.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MARINELINK_DB_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("MARINELINK_HTTP_ADDR") {
            self.server.http_addr = v;
        }
        if let Some(v) = lookup("MARINELINK_WS_ADDR") {
            self.server.ws_addr = v;
        }
        if let Some(v) = lookup("MARINELINK_MQTT_HOST") {
            self.broker.host = v;
        }
        if let Some(v) = lookup("MARINELINK_MQTT_PORT") {
            self.broker.port = parse_env("MARINELINK_MQTT_PORT", &v)?;
        }
        if let Some(v) = lookup("MARINELINK_MQTT_USERNAME") {
            self.broker.username = Some(v);
        }
        if let Some(v) = lookup("MARINELINK_MQTT_PASSWORD") {
            self.broker.password = Some(v);
        }
        if let Some(v) = lookup("MARINELINK_MASTER_KEY") {
            self.credentials.master_key_hex = v;
        }
        if let Some(v) = lookup("MARINELINK_KEY_EPOCH") {
            self.credentials.key_epoch = parse_env("MARINELINK_KEY_EPOCH", &v)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CoreError::InvalidPayload(format!("{} has an invalid value", name)))
}
