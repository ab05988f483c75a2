use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    auth::{AuthService, SESSION_COOKIE},
    domain::{RegisterUserRequest, UpdateProfileRequest, User, UserRole},
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: User,
}

/// Creates a customer account and logs it in.
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, CookieJar, Json<User>)> {
    req.validate()?;

    let user = state.service_context.user_repo
        .create(req, UserRole::Customer)
        .await?;

    let (_session, token) = state.service_context.auth_service
        .create_session(user.id)
        .await?;
    let cookie = state.service_context.auth_service
        .create_session_cookie(&token, state.settings.server.is_https());

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, jar.add(cookie), Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let (user, password_hash) = state.service_context.user_repo
        .find_credentials(&req.email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !AuthService::verify_password(&req.password, &password_hash).await? {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(AppError::Unauthorized);
    }

    let (_session, token) = state.service_context.auth_service
        .create_session(user.id)
        .await?;

    let cookie = state.service_context.auth_service
        .create_session_cookie(&token, state.settings.server.is_https());

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            message: "Login successful".to_string(),
            user,
        })
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        if let Err(e) = state.service_context.auth_service
            .invalidate_session(session_cookie.value())
            .await
        {
            tracing::warn!(error = %e, "Failed to invalidate session on logout");
        }
    }

    let jar = jar.add(AuthService::create_logout_cookie());

    Ok((jar, StatusCode::NO_CONTENT))
}

pub async fn me(Extension(current_user): Extension<CurrentUser>) -> Json<User> {
    Json(current_user.user)
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    req.validate()?;

    let user = state.service_context.user_repo
        .update_profile(current_user.user.id, req)
        .await?;

    Ok(Json(user))
}

/// Deletes the caller's account, which also ends all of its sessions.
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    state.service_context.user_repo
        .delete(current_user.user.id)
        .await?;

    tracing::info!(user_id = %current_user.user.id, "User deleted their account");

    Ok((jar.add(AuthService::create_logout_cookie()), StatusCode::NO_CONTENT))
}
