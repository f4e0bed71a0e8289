//! Route table.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

pub mod device;
pub mod owner;

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(health_check))
        // Device-facing, HMAC signed
        .route("/devices/:id/pull-commands", post(device::pull_commands))
        .route("/devices/:id/ack", post(device::ack))
        .route("/ingest/telemetry", post(device::ingest_telemetry))
        // Owner-facing
        .route("/boats", post(owner::create_boat))
        .route("/boats/me", get(owner::my_boat))
        .route("/boats/status", get(owner::boat_status))
        .route(
            "/boats/channels",
            get(owner::list_channels).post(owner::create_channel),
        )
        .route("/channels/:id/toggle", post(owner::toggle_channel))
        .route("/devices", get(owner::list_devices).post(owner::create_device))
        .route("/devices/:id/rotate-key", post(owner::rotate_key))
        .route("/telemetry/query", post(owner::query_telemetry))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "marinelink-api",
        "timestamp": Utc::now().to_rfc3339(),
        "broker": state.broker_state(),
    }))
}
