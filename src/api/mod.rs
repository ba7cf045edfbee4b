mod auth;
mod error;
mod users;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use url::Url;

use crate::auth::CookieSettings;
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::oauth::Providers;
use crate::session::SessionManager;

pub use auth::AuthState;
pub use error::ApiError;
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    cookies: Arc<CookieSettings>,
    providers: Providers,
    frontend_url: Url,
) -> Router {
    let auth_state = auth::AuthState {
        session: SessionManager::new(db.clone(), jwt.clone(), cookies.clone()),
        providers,
        cookies: cookies.clone(),
        frontend_url,
    };

    let users_state = users::UsersState { db, jwt, cookies };

    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(auth_state))
        .nest("/users", users::router(users_state))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
