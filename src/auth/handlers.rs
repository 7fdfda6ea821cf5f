use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        repo_types::User,
        services::{hash_password, validate_registration, verify_password, AuthUser, JwtKeys},
    },
    error::{AppError, AppResult},
    profiles::repo_types::{NewProfile, Profile},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

fn issue_tokens(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id, user.token_version).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        AppError::Internal(e)
    })?;
    let refresh_token = keys.sign_refresh(user.id, user.token_version).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        AppError::Internal(e)
    })?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser {
            id: user.id,
            username: user.username,
        },
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let errors = validate_registration(&mut payload);
    if !errors.is_empty() {
        warn!(?errors, "registration rejected");
        return Err(AppError::Validation(errors));
    }

    if User::username_taken(&state.db, &payload.username, None).await? {
        warn!(username = %payload.username, "username already registered");
        return Err(AppError::Conflict("Username already registered".into()));
    }

    let hash = hash_password(&payload.password)?;

    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    // A concurrent registration can still take the name after the check above.
    let user = User::create_tx(&mut tx, &payload.username, &hash)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "Username already registered"))?;
    Profile::create_tx(
        &mut tx,
        user.id,
        &NewProfile {
            gender: payload.gender.map(|g| g.as_str().to_string()),
            birthdate: payload.birthdate,
            phone: payload.phone.clone(),
            email: payload.email.clone(),
        },
    )
    .await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.username = payload.username.trim().to_string();
    let invalid = || AppError::Unauthorized("Invalid username or password".into());

    let user = match User::find_by_username(&state.db, &payload.username).await? {
        Some(u) => u,
        None => {
            warn!(username = %payload.username, "login unknown username");
            return Err(invalid());
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| AppError::InvalidToken)?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    if claims.ver != user.token_version {
        warn!(user_id = %user.id, "refresh token revoked by logout");
        return Err(AppError::InvalidToken);
    }

    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<StatusCode> {
    let ver = User::bump_token_version(&state.db, user_id).await?;
    info!(%user_id, token_version = ver, "user logged out");
    Ok(StatusCode::NO_CONTENT)
}
