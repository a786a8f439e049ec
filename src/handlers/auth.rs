// Authentication handlers: register, login, current user

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::middleware::auth::CurrentUser;
use crate::models::{NewUser, User, UserError, UserTier};
use crate::utils::{generate_api_key, hash_password, verify_password, ApiError};

/// Credits granted to a newly registered account
const STARTING_CREDITS: i32 = 10;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let password_hash =
        hash_password(&req.password).map_err(|e| ApiError::Database(e.to_string()))?;

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?;

    let user = User::create(
        &mut conn,
        NewUser {
            email: req.email.trim().to_lowercase(),
            password_hash,
            tier: UserTier::Free,
            credits: STARTING_CREDITS,
            api_key: Some(generate_api_key()),
        },
    )
    .await
    .map_err(|e| match e {
        UserError::AlreadyExists => ApiError::Validation("User already exists".to_string()),
        other => ApiError::Database(other.to_string()),
    })?;

    info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let mut conn = state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?;

    let user = User::find_active_by_email(&mut conn, &req.email.trim().to_lowercase())
        .await
        .map_err(|e| match e {
            UserError::NotFound => ApiError::Unauthorized,
            other => ApiError::Database(other.to_string()),
        })?;

    let valid = verify_password(&req.password, &user.password_hash)
        .map_err(|e| ApiError::Database(e.to_string()))?;
    if !valid {
        return Err(ApiError::Unauthorized);
    }

    // Best-effort; a failed timestamp write must not block the login
    if let Err(e) = User::update_last_login(&mut conn, user.id).await {
        tracing::warn!(user_id = %user.id, error = %e, "Failed to update last login");
    }

    let token = state
        .jwt_service
        .generate_token(&user)
        .map_err(|e| ApiError::Database(e.to_string()))?;

    info!(user_id = %user.id, "User logged in");
    Ok(Json(json!({ "token": token, "user": user })))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<serde_json::Value> {
    Json(json!({ "user": user }))
}
