//! Registration, login and profile endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::Address;
use domain::views::{ProfileView, profile_view};
use domain::{ProfileUpdate, Registration};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;
use crate::{AppState, Authenticated};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub name: String,
    pub role: &'static str,
}

/// POST /accounts: register a customer or admin.
#[tracing::instrument(skip(state, registration))]
pub async fn register<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<ProfileView>), ApiError> {
    let user = state.accounts.register(registration).await?;
    Ok((StatusCode::CREATED, Json(profile_view(&user))))
}

/// POST /sessions: log in and receive a bearer token.
#[tracing::instrument(skip(state, req))]
pub async fn login<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let session = state.accounts.login(&req.email, &req.password).await?;
    let user_id = session.user_id().to_string();
    let name = session.name().to_string();
    let role = session.role().as_str();
    let token = state.sessions.issue(session).await;

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            token,
            user_id,
            name,
            role,
        }),
    ))
}

/// DELETE /sessions/:token: log out.
#[tracing::instrument(skip_all)]
pub async fn logout<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session = state
        .sessions
        .revoke(&token)
        .await
        .ok_or_else(|| ApiError::Unauthorized("unknown or expired session".to_string()))?;
    state.accounts.logout(session);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /profile: the logged-in user's profile.
pub async fn profile<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
) -> Result<Json<ProfileView>, ApiError> {
    let user = state.accounts.profile(&session).await?;
    Ok(Json(profile_view(&user)))
}

/// PATCH /profile: update name, age, phone number or address.
#[tracing::instrument(skip_all)]
pub async fn update_profile<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileView>, ApiError> {
    let user = state.accounts.update_profile(&session, update).await?;
    Ok(Json(profile_view(&user)))
}

/// PUT /profile/address: replace the address on the profile.
#[tracing::instrument(skip_all)]
pub async fn update_address<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Json(address): Json<Address>,
) -> Result<Json<ProfileView>, ApiError> {
    let user = state.accounts.update_address(&session, address).await?;
    Ok(Json(profile_view(&user)))
}
