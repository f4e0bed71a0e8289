//! Cross-crate integration tests
//!
//! This suite drives the pieces the API service wires together, without
//! HTTP or a live broker:
//! - owner toggle to durable ledger to device claim and ack
//! - device request authentication and credential protection
//! - inbound broker traffic to presence, channel state, telemetry and alerts

pub mod test_utils;

#[cfg(test)]
mod command_flow_tests;

#[cfg(test)]
mod device_auth_tests;

#[cfg(test)]
mod inbound_flow_tests;
