//! OAuth login, callback and logout endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use super::error::ApiError;
use crate::auth::{CookieSettings, OAUTH_STATE_COOKIE_NAME, cookie_header, get_cookie};
use crate::db::OAuthProvider;
use crate::oauth::{IdentityProvider, Providers, generate_state};
use crate::session::SessionManager;

/// Lifetime of the `oauth_state` cookie: 10 minutes
const OAUTH_STATE_DURATION_SECS: i64 = 10 * 60;

#[derive(Clone)]
pub struct AuthState {
    pub session: SessionManager,
    pub providers: Providers,
    pub cookies: Arc<CookieSettings>,
    pub frontend_url: Url,
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/{provider}/login", get(login))
        .route("/{provider}/callback", get(callback))
        .route("/logout", post(logout))
        .with_state(state)
}

fn resolve_provider(
    state: &AuthState,
    tag: &str,
) -> Result<(OAuthProvider, Arc<dyn IdentityProvider>), ApiError> {
    let provider = OAuthProvider::parse(tag)
        .filter(|p| *p != OAuthProvider::Local)
        .ok_or_else(|| ApiError::not_found("Unknown provider"))?;
    let identity_provider = state
        .providers
        .get(provider)
        .ok_or_else(|| ApiError::not_found("Provider is not configured"))?;
    Ok((provider, identity_provider))
}

/// 302 response carrying any number of `Set-Cookie` headers.
fn redirect_with_cookies<'a>(
    location: &str,
    cookies: impl IntoIterator<Item = &'a str>,
) -> Response {
    let mut response = (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
    let headers = response.headers_mut();
    for cookie in cookies {
        if let Some(value) = cookie_header(cookie) {
            headers.append(header::SET_COOKIE, value);
        }
    }
    response
}

async fn login(
    State(state): State<AuthState>,
    Path(tag): Path<String>,
) -> Result<Response, ApiError> {
    let (provider, identity_provider) = resolve_provider(&state, &tag)?;

    let oauth_state = generate_state();
    let authorize_url = identity_provider.authorize_url(&oauth_state).map_err(|e| {
        tracing::error!(provider = %provider, "Failed to build authorization URL: {}", e);
        ApiError::internal("Failed to start login")
    })?;

    let state_cookie = state.cookies.build(
        OAUTH_STATE_COOKIE_NAME,
        &oauth_state,
        OAUTH_STATE_DURATION_SECS,
        chrono::Utc::now(),
    );

    Ok(redirect_with_cookies(
        authorize_url.as_str(),
        [state_cookie.as_str()],
    ))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

async fn callback(
    State(state): State<AuthState>,
    Path(tag): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (provider, identity_provider) = resolve_provider(&state, &tag)?;

    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing authorization code"))?;
    let oauth_state = query.state.as_deref().unwrap_or("");

    if let Some(expected) = get_cookie(&headers, OAUTH_STATE_COOKIE_NAME) {
        if expected != oauth_state {
            tracing::warn!(provider = %provider, "OAuth state mismatch");
            return Err(ApiError::bad_request("Invalid state"));
        }
    }

    let identity = identity_provider
        .exchange(code, oauth_state)
        .await
        .map_err(|e| {
            tracing::error!(provider = %provider, "Provider exchange failed: {}", e);
            ApiError::internal("Failed to authenticate with provider")
        })?;

    let user = state.session.upsert_identity(provider, &identity).await?;
    let session = state.session.login_and_issue_session(user).await?;

    let mut destination = state.frontend_url.clone();
    destination.query_pairs_mut().append_pair("login", "success");

    let clear_state = state.cookies.clear(OAUTH_STATE_COOKIE_NAME);
    let [access, refresh] = session.cookies();
    Ok(redirect_with_cookies(
        destination.as_str(),
        [access, refresh, clear_state.as_str()],
    ))
}

async fn logout(State(state): State<AuthState>) -> Response {
    let [access, refresh] = state.session.logout_cookies();
    let mut response = Json(serde_json::json!({ "message": "Logged out" })).into_response();
    let headers = response.headers_mut();
    for cookie in [access, refresh] {
        if let Some(value) = cookie_header(&cookie) {
            headers.append(header::SET_COOKIE, value);
        }
    }
    response
}
