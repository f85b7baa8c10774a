use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{role, role_permission, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::auth::{
    Credentials, LoginResponse, Profile, RegisterResponse, SetUserRoleRequest, UserResponse,
    validate_login, validate_new_account,
};
use crate::state::AppState;
use crate::utils::{hash, jwt};

#[utoipa::path(
    post,
    path = "/register",
    tag = "Auth",
    operation_id = "register",
    summary = "Register a new user",
    description = "Creates an account with the default `user` role.",
    request_body = Credentials,
    responses(
        (status = 201, description = "User created", body = RegisterResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Username taken (USERNAME_TAKEN)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    validate_new_account(&payload)?;

    let username = payload.username.trim().to_string();
    let hash = hash::hash_password_blocking(payload.password).await?;

    let new_user = user::ActiveModel {
        username: Set(username),
        password: Set(hash),
        role: Set(role::DEFAULT_ROLE.to_string()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let user = new_user.insert(&state.db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::UsernameTaken,
        _ => AppError::from(e),
    })?;

    tracing::info!(user_id = user.id, "User registered");
    Ok((StatusCode::CREATED, Json(RegisterResponse::from(user))))
}

#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    operation_id = "login",
    summary = "Log in and obtain a bearer token",
    request_body = Credentials,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Bad credentials (INVALID_CREDENTIALS)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Credentials>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_login(&payload)?;

    let user = user::Entity::find()
        .filter(user::Column::Username.eq(payload.username.trim()))
        .one(&state.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !hash::verify_password_blocking(payload.password, user.password.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }

    let permissions = role_permissions(&state.db, &user.role).await?;

    let token = jwt::sign(
        user.id,
        &user.username,
        &user.role,
        permissions.clone(),
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_hours,
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))?;

    Ok(Json(LoginResponse {
        token,
        profile: Profile {
            id: user.id,
            username: user.username,
            role: user.role,
            permissions,
        },
    }))
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "Auth",
    operation_id = "me",
    summary = "Current user",
    responses(
        (status = 200, description = "Profile of the token holder", body = Profile),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(auth_user), fields(user_id = auth_user.user_id))]
pub async fn me(auth_user: AuthUser) -> Json<Profile> {
    Json(Profile {
        id: auth_user.user_id,
        username: auth_user.username,
        role: auth_user.role,
        permissions: auth_user.permissions,
    })
}

#[utoipa::path(
    put,
    path = "/users/{id}/role",
    tag = "Auth",
    operation_id = "setUserRole",
    summary = "Change a user's role",
    description = "Requires `user:manage`. The new role takes effect on the user's next login.",
    params(("id" = i32, Path, description = "User ID")),
    request_body = SetUserRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = UserResponse),
        (status = 400, description = "Unknown role (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id, role = %payload.role))]
pub async fn set_user_role(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<SetUserRoleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    auth_user.require_permission("user:manage")?;

    let role_name = payload.role.trim();
    if role::Entity::find_by_id(role_name)
        .one(&state.db)
        .await?
        .is_none()
    {
        return Err(AppError::Validation(format!("Unknown role '{role_name}'")));
    }

    let existing = user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let mut active: user::ActiveModel = existing.into();
    active.role = Set(role_name.to_string());
    let updated = active.update(&state.db).await?;

    tracing::info!(user_id = id, role = %updated.role, by = auth_user.user_id, "User role changed");
    Ok(Json(updated.into()))
}

async fn role_permissions<C: ConnectionTrait>(db: &C, role: &str) -> Result<Vec<String>, AppError> {
    Ok(role_permission::Entity::find()
        .filter(role_permission::Column::Role.eq(role))
        .all(db)
        .await?
        .into_iter()
        .map(|rp| rp.permission)
        .collect())
}
