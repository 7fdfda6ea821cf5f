use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::generator::{generate, write_artifact};
use super::processor::{process_artifact, process_batch, ImportOutcome};
use crate::state::AppState;

/// Device name/type used when viewing the profile triggers a sync.
pub const DEFAULT_DEVICE_NAME: &str = "default_device";
pub const DEFAULT_DEVICE_TYPE: &str = "default_type";

#[derive(Debug, Serialize)]
pub struct SyncReport {
    #[serde(with = "time::serde::rfc3339")]
    pub synced_at: OffsetDateTime,
    pub stamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    pub outcome: ImportOutcome,
}

/// Generates a fresh day of device data and imports it for the user.
///
/// The batch is handed to the processor in memory. When an artifact directory
/// is configured the batch is written there as JSON and imported from that
/// file instead, so the artifact on disk is exactly what was stored.
///
/// Device `last_import_at` is left to the caller: a profile view marks every
/// device, a device sync only the one it ran for.
#[instrument(skip(state))]
pub async fn sync_user(
    state: &AppState,
    user_id: Uuid,
    username: &str,
    device_name: &str,
    device_type: &str,
) -> anyhow::Result<SyncReport> {
    let now = state.clock.now();
    let generated = generate(device_name, device_type, now)?;

    let store = state.activity.as_ref();
    let (artifact, outcome) = match &state.config.artifact_dir {
        Some(dir) => {
            let path = write_artifact(dir, username, &generated).await?;
            let outcome = process_artifact(store, &path, user_id, &generated.stamp).await?;
            (Some(path.display().to_string()), outcome)
        }
        None => (None, process_batch(store, user_id, &generated.batch).await?),
    };

    if outcome.is_success() {
        info!(%user_id, stamp = %generated.stamp, ?outcome, "device sync finished");
    } else {
        warn!(%user_id, stamp = %generated.stamp, ?outcome, "device sync imported nothing");
    }

    Ok(SyncReport {
        synced_at: now,
        stamp: generated.stamp,
        artifact,
        outcome,
    })
}

/// The sync behind a profile view: default device, then every device of the
/// user is marked as synced at the report time.
#[instrument(skip(state))]
pub async fn sync_on_profile_view(
    state: &AppState,
    user_id: Uuid,
    username: &str,
) -> anyhow::Result<SyncReport> {
    let report = sync_user(
        state,
        user_id,
        username,
        DEFAULT_DEVICE_NAME,
        DEFAULT_DEVICE_TYPE,
    )
    .await?;
    let touched = state.activity.touch_devices(user_id, report.synced_at).await?;
    debug!(%user_id, touched, "devices marked as synced");
    Ok(report)
}
