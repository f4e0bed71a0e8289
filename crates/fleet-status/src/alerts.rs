//! Alert policy evaluated on every ingested telemetry sample.
//!
//! The default policy is a small declarative table of threshold rules.

use chrono::{DateTime, Utc};
use marinelink_core::AlertConfig;
use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub level: AlertLevel,
    pub key: String,
    pub value: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Decides which alerts a sample raises.
pub trait AlertPolicy: Send + Sync {
    fn evaluate(&self, sample: &TelemetrySample) -> Vec<Alert>;
}

/// Fires when the numeric value of `key` drops below `below`.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub key: String,
    pub below: f64,
    pub level: AlertLevel,
    pub message: String,
}

impl ThresholdRule {
    pub fn new(key: impl Into<String>, below: f64, level: AlertLevel, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            below,
            level,
            message: message.into(),
        }
    }

    fn matches(&self, sample: &TelemetrySample) -> bool {
        if sample.key != self.key {
            return false;
        }
        // Non-numeric values never trigger
        match sample.value.trim().parse::<f64>() {
            Ok(v) => v < self.below,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ThresholdRules {
    rules: Vec<ThresholdRule>,
}

impl ThresholdRules {
    pub fn new(rules: Vec<ThresholdRule>) -> Self {
        Self { rules }
    }

    /// Built-in table: low battery voltage.
    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(vec![ThresholdRule::new(
            "battery.voltage",
            config.battery_low_voltage,
            AlertLevel::Warning,
            "Low battery voltage",
        )])
    }

    pub fn with_rule(mut self, rule: ThresholdRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }
}

impl AlertPolicy for ThresholdRules {
    fn evaluate(&self, sample: &TelemetrySample) -> Vec<Alert> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(sample))
            .map(|rule| Alert {
                level: rule.level,
                key: sample.key.clone(),
                value: sample.value.clone(),
                message: rule.message.clone(),
                created_at: sample.created_at,
            })
            .collect()
    }
}
