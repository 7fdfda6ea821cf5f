use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{CreateDeviceRequest, SyncResponse};
use super::repo::Device;
use crate::{
    activity::sync::sync_user,
    auth::{repo_types::User, services::AuthUser},
    error::{AppError, AppResult},
    state::AppState,
};

pub fn device_routes() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices).post(add_device))
        .route("/devices/:id/sync", post(sync_device))
}

#[instrument(skip(state))]
pub async fn list_devices(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<Device>>> {
    Ok(Json(Device::list_by_user(&state.db, user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn add_device(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(mut payload): Json<CreateDeviceRequest>,
) -> AppResult<(StatusCode, Json<Device>)> {
    let errors = payload.validate();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let device = Device::create(
        &state.db,
        user_id,
        &payload.name,
        &payload.device_type,
        state.clock.now(),
    )
    .await?;
    info!(%user_id, device_id = device.id, "device added");
    Ok((StatusCode::CREATED, Json(device)))
}

/// Pulls a fresh day from the device. A sync that imports nothing is still a 200.
#[instrument(skip(state))]
pub async fn sync_device(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(device_id): Path<i64>,
) -> AppResult<Json<SyncResponse>> {
    let mut device = Device::find_by_id(&state.db, device_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Device not found".into()))?;

    if device.user_id != user_id {
        warn!(%user_id, device_id, "sync of foreign device refused");
        return Err(AppError::Forbidden("Device belongs to another user".into()));
    }

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    let sync = sync_user(&state, user_id, &user.username, &device.name, &device.device_type).await?;
    Device::touch(&state.db, device.id, sync.synced_at).await?;
    device.last_import_at = sync.synced_at;

    Ok(Json(SyncResponse { device, sync }))
}
