use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt, validate_username};
use crate::auth::{AuthUser, CookieSettings, require_auth};
use crate::db::{Database, NewUser, User, UserRole};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub cookies: Arc<CookieSettings>,
}

impl_has_auth_backend!(UsersState);

/// Every user route sits behind the auth guard.
pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/me", get(me))
        .route("/{id}", put(update_user))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<UsersState>,
        ))
        .with_state(state)
}

async fn list_users(
    State(state): State<UsersState>,
    AuthUser(_): AuthUser,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = state
        .db
        .users()
        .list_all()
        .await
        .db_err("Failed to list users")?;
    Ok(Json(users))
}

#[derive(Deserialize)]
struct CreateUserRequest {
    username: String,
}

async fn create_user(
    State(state): State<UsersState>,
    AuthUser(_): AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();
    validate_username(username)?;

    let new_user = NewUser::local(username);
    let existing = state
        .db
        .users()
        .find_by_email(&new_user.email)
        .await
        .db_err("Failed to check username availability")?;
    if existing.is_some() {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let user = state
        .db
        .users()
        .create(&new_user)
        .await
        .db_err("Failed to create user")?;

    tracing::info!(user_id = user.id, "Created local user");

    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Serialize)]
struct MeResponse {
    id: i64,
    name: String,
    email: String,
}

async fn me(
    State(state): State<UsersState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MeResponse>, ApiError> {
    let user = state
        .db
        .users()
        .find_by_id(user_id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(MeResponse {
        id: user.id,
        name: user.nickname,
        email: user.email,
    }))
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    name: String,
    nickname: String,
    #[serde(default)]
    profile_image: String,
    role: UserRole,
}

/// Admin-only overwrite of a user's profile fields and role.
async fn update_user(
    State(state): State<UsersState>,
    AuthUser(caller_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let caller = state
        .db
        .users()
        .find_by_id(caller_id)
        .await
        .db_err("Failed to get user")?;
    if caller.map(|c| c.role) != Some(UserRole::Admin) {
        return Err(ApiError::forbidden("Admin access required"));
    }

    let mut user = state
        .db
        .users()
        .find_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    user.name = payload.name;
    user.nickname = payload.nickname;
    user.profile_image = payload.profile_image;
    user.role = payload.role;

    let updated = state
        .db
        .users()
        .update(&user)
        .await
        .db_err("Failed to update user")?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user_id = id, admin_id = caller_id, "Updated user");

    let user = state
        .db
        .users()
        .find_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user))
}
