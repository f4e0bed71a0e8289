//! Owner-facing endpoints. The owner id comes from `X-Owner-Id`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Json;
use marinelink_command_ledger::{ChannelSet, CHANNEL_SET};
use marinelink_core::CoreError;
use marinelink_domain::{
    Boat, BoatStatus, Channel, ChannelCreate, DeviceCreate, DeviceCreated, DeviceSummary,
    KeyRotated, ToggleChannel,
};
use marinelink_fleet_status::{TelemetryPage, TelemetryQuery};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{Owner, NEW_KEY_HEADER};
use crate::error::{blocking, ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BoatCreate {
    pub name: String,
}

/// `POST /boats`
pub async fn create_boat(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(req): Json<BoatCreate>,
) -> ApiResult<(StatusCode, Json<Boat>)> {
    let boat = blocking(move || Ok(state.boats.create(owner, &req.name)?)).await?;
    Ok((StatusCode::CREATED, Json(boat)))
}

/// `GET /boats/me`
pub async fn my_boat(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> ApiResult<Json<Boat>> {
    let boat = blocking(move || Ok(state.boats.require_for_owner(owner)?)).await?;
    Ok(Json(boat))
}

/// `GET /boats/status`: aggregated presence of the owner's devices.
pub async fn boat_status(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> ApiResult<Json<BoatStatus>> {
    let status = blocking(move || {
        let boat_id = state.boats.owner_boat_id(owner)?;
        Ok(state.presence.boat_status(boat_id)?)
    })
    .await?;
    Ok(Json(status))
}

/// `POST /boats/channels`
pub async fn create_channel(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(req): Json<ChannelCreate>,
) -> ApiResult<(StatusCode, Json<Channel>)> {
    let channel = blocking(move || Ok(state.channels.create(owner, &req)?)).await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

/// `GET /boats/channels`
pub async fn list_channels(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> ApiResult<Json<Vec<Channel>>> {
    let channels = blocking(move || Ok(state.channels.list(owner)?)).await?;
    Ok(Json(channels))
}

/// `POST /channels/{id}/toggle`
///
/// Persists the new state, queues `channel.set` for every active device on
/// the boat and broadcasts the state optimistically. Success means the
/// ledger rows committed; delivery is observed later through acks and echoes.
pub async fn toggle_channel(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(channel_id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<Channel>> {
    // An empty body flips; anything else must parse
    let req: ToggleChannel = if body.iter().all(u8::is_ascii_whitespace) {
        ToggleChannel::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let channel = blocking(move || {
        let channel = state.channels.toggle(owner, channel_id, &req)?;

        let payload = ChannelSet {
            channel_id: channel.id,
            pin: channel.pin,
            state: channel.state,
        };
        let queued = state
            .ledger
            .enqueue_for_boat(channel.boat_id, CHANNEL_SET, &payload)?;

        state
            .hub
            .broadcast_channel_state(channel.boat_id, channel.id, channel.pin, channel.state);

        info!(
            channel_id = %channel.id,
            state = channel.state,
            devices = queued.len(),
            "Toggle queued"
        );
        Ok(channel)
    })
    .await?;

    Ok(Json(channel))
}

/// `POST /devices`: the plaintext key is in the response and nowhere else.
pub async fn create_device(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(req): Json<DeviceCreate>,
) -> ApiResult<(StatusCode, Json<DeviceCreated>)> {
    let created = blocking(move || {
        let (device, key) = state.devices.create(owner, &req.name)?;
        Ok(DeviceCreated {
            device,
            device_key: key.expose().to_string(),
        })
    })
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /devices`
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> ApiResult<Json<Vec<DeviceSummary>>> {
    let devices = blocking(move || Ok(state.devices.list(owner)?)).await?;
    Ok(Json(devices))
}

/// `POST /devices/{id}/rotate-key`: new key in the body and in
/// `X-New-Device-Key`.
pub async fn rotate_key(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(device_id): Path<Uuid>,
) -> ApiResult<(HeaderMap, Json<KeyRotated>)> {
    let key = blocking(move || Ok(state.devices.rotate_key(owner, device_id)?)).await?;

    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(key.expose())
        .map_err(|_| ApiError(CoreError::Transient("key not header-safe".into())))?;
    headers.insert(HeaderName::from_static(NEW_KEY_HEADER), value);

    Ok((
        headers,
        Json(KeyRotated {
            device_id,
            new_device_key: key.expose().to_string(),
        }),
    ))
}

/// `POST /telemetry/query`
pub async fn query_telemetry(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(query): Json<TelemetryQuery>,
) -> ApiResult<Json<TelemetryPage>> {
    let page = blocking(move || {
        let boat_id = state.boats.owner_boat_id(owner)?;
        Ok(state.telemetry.store().query(boat_id, &query)?)
    })
    .await?;
    Ok(Json(page))
}
