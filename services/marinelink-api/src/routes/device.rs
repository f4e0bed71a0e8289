//! Device-facing endpoints, authenticated by HMAC over the raw body.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use marinelink_command_ledger::CommandEnvelope;
use marinelink_core::CoreError;
use marinelink_fleet_status::TelemetryInput;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth;
use crate::error::{blocking, ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
struct PullRequest {
    #[serde(default)]
    max: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AckRequest {
    pub id: i64,
}

/// `POST /devices/{id}/pull-commands`
///
/// Body is optional (`{"max": n}`); the signature covers whatever bytes were
/// sent, including an empty body.
pub async fn pull_commands(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Vec<CommandEnvelope>>> {
    let signature = auth::signature(&headers)?;

    let batch = blocking(move || {
        state
            .authenticator
            .verify(&body, &signature, device_id)?;

        let request: PullRequest = if body.iter().all(u8::is_ascii_whitespace) {
            PullRequest::default()
        } else {
            serde_json::from_slice(&body)?
        };

        let limit = state.config.server.pull_batch_size.max(1);
        let max = request.max.unwrap_or(limit).clamp(1, limit);
        Ok(state.ledger.claim(device_id, max)?)
    })
    .await?;

    Ok(Json(batch))
}

/// `POST /devices/{id}/ack`
///
/// Signed over the canonical `{"id":<id>}` string, not the body.
pub async fn ack(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = auth::signature(&headers)?;
    let AckRequest { id: command_id } = serde_json::from_slice(&body)?;

    blocking(move || {
        state
            .authenticator
            .verify_ack(device_id, command_id, &signature)?;
        state.ledger.ack(device_id, command_id)?;
        Ok(())
    })
    .await?;

    Ok(Json(json!({ "id": command_id, "status": "acked" })))
}

/// `POST /ingest/telemetry` with `X-Device-Id` and `X-Signature`.
pub async fn ingest_telemetry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let device_id = auth::device_id(&headers)?;
    let signature = auth::signature(&headers)?;

    let outcome = blocking(move || {
        let device = state.authenticator.verify(&body, &signature, device_id)?;
        let input: TelemetryInput = serde_json::from_slice(&body)?;
        if input.device_id.is_some_and(|id| id != device.device_id) {
            return Err(ApiError(CoreError::InvalidPayload(
                "deviceId does not match the signing device".into(),
            )));
        }
        Ok(state
            .telemetry
            .ingest(device.boat_id, Some(device.device_id), &input)?)
    })
    .await?;

    if !outcome.alerts.is_empty() {
        info!(device_id = %device_id, alerts = outcome.alerts.len(), "Telemetry raised alerts");
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "id": outcome.sample.id,
            "alerts": outcome.alerts.len(),
        })),
    ))
}
