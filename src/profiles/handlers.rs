use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{ImageResponse, ProfileDetails, ProfileResponse, UpdateProfileRequest};
use super::repo_types::{NewProfile, Profile};
use super::services::validate_profile_fields;
use crate::{
    activity::sync::sync_on_profile_view,
    auth::{repo_types::User, services::AuthUser},
    error::{AppError, AppResult},
    state::AppState,
    storage::{ext_from_mime, profile_image_key},
};

const IMAGE_URL_TTL_SECS: u64 = 30 * 60;

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route(
            "/profile/image",
            put(upload_image).layer(DefaultBodyLimit::max(10 * 1024 * 1024)),
        )
}

async fn load_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))
}

async fn load_profile(state: &AppState, user_id: Uuid) -> AppResult<Profile> {
    Profile::find_by_user(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))
}

async fn details(state: &AppState, username: String, profile: Profile) -> AppResult<ProfileDetails> {
    let image_url = match &profile.image_key {
        Some(key) => Some(state.images.presign_image(key, IMAGE_URL_TTL_SECS).await?),
        None => None,
    };
    Ok(ProfileDetails {
        username,
        email: profile.email,
        gender: profile.gender,
        birthdate: profile.birthdate,
        phone: profile.phone,
        image_url,
    })
}

/// Viewing the profile pulls a fresh day from the default device first.
#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ProfileResponse>> {
    let user = load_user(&state, user_id).await?;

    let sync = sync_on_profile_view(&state, user.id, &user.username).await?;

    let totals = state.activity.totals(user.id).await?;
    let profile = load_profile(&state, user.id).await?;

    Ok(Json(ProfileResponse {
        profile: details(&state, user.username, profile).await?,
        totals,
        sync,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(mut payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfileDetails>> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    let errors = validate_profile_fields(&payload.username, &payload.email, payload.phone.as_deref());
    if !errors.is_empty() {
        warn!(?errors, "profile edit rejected");
        return Err(AppError::Validation(errors));
    }
    if User::username_taken(&state.db, &payload.username, Some(user_id)).await? {
        return Err(AppError::Conflict("Username already registered".into()));
    }

    let fields = NewProfile {
        gender: payload.gender.map(|g| g.as_str().to_string()),
        birthdate: payload.birthdate,
        phone: payload.phone,
        email: payload.email,
    };

    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    User::rename_tx(&mut tx, user_id, &payload.username)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "Username already registered"))?;
    let profile = Profile::update_tx(&mut tx, user_id, &fields).await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    info!(%user_id, "profile updated");
    Ok(Json(details(&state, payload.username, profile).await?))
}

/// Multipart upload, field `image`.
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> AppResult<Json<ImageResponse>> {
    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let ext = ext_from_mime(&content_type)
            .ok_or_else(|| AppError::BadRequest(format!("Unsupported image type {}", content_type)))?;
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        upload = Some((body, content_type, ext));
        break;
    }

    let Some((body, content_type, ext)) = upload else {
        return Err(AppError::BadRequest("image is required".into()));
    };
    if body.is_empty() {
        return Err(AppError::BadRequest("image is empty".into()));
    }

    let key = profile_image_key(user_id, ext);
    state.images.put_image(&key, body, &content_type).await?;

    if let Some(old) = Profile::replace_image_key(&state.db, user_id, &key).await? {
        if let Err(e) = state.images.delete_image(&old).await {
            warn!(error = %e, key = %old, "failed to delete previous profile image");
        }
    }

    info!(%user_id, %key, "profile image stored");
    let image_url = state.images.presign_image(&key, IMAGE_URL_TTL_SECS).await?;
    Ok(Json(ImageResponse { image_url }))
}
