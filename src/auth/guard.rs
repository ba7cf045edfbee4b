//! Per-request authentication with transparent access token reissue.
//!
//! A request is authorized by a valid `access_token` cookie, or failing that
//! by a stored, unexpired `refresh_token`, in which case a new access token
//! cookie is attached to the response. Expired and absent access tokens take
//! the same path and are only told apart in the logs.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, cookie_header, get_cookie};
use super::errors::{AuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::{AuthUserId, Authenticated};

/// Resolve the user behind a request from its cookies.
pub async fn authenticate<B>(headers: &HeaderMap, backend: &B) -> Result<Authenticated, AuthErrorKind>
where
    B: HasAuthBackend + Sync + ?Sized,
{
    match get_cookie(headers, ACCESS_COOKIE_NAME) {
        Some(access_token) => match backend.jwt().verify(access_token) {
            Ok(claims) if claims.user_id() > 0 => {
                return Ok(Authenticated {
                    user_id: claims.user_id(),
                    reissued_cookie: None,
                });
            }
            Ok(_) => tracing::debug!("Access token subject is not a user, trying refresh"),
            Err(e) => tracing::debug!(error = %e, "Access token rejected, trying refresh"),
        },
        None => tracing::debug!("No access token, trying refresh"),
    }

    let refresh_token =
        get_cookie(headers, REFRESH_COOKIE_NAME).ok_or(AuthErrorKind::NoCredentials)?;

    reissue(refresh_token, backend).await
}

/// Mint a new access token from a stored refresh token. The refresh token
/// itself is left as is.
async fn reissue<B>(refresh_token: &str, backend: &B) -> Result<Authenticated, AuthErrorKind>
where
    B: HasAuthBackend + Sync + ?Sized,
{
    let stored = backend
        .db()
        .refresh_tokens()
        .find_by_token(refresh_token)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up refresh token: {}", e);
            AuthErrorKind::Store
        })?
        .ok_or_else(|| {
            tracing::info!("Refresh token not found");
            AuthErrorKind::RefreshTokenNotFound
        })?;

    if stored.is_expired_at(Utc::now()) {
        tracing::info!(user_id = stored.user_id, "Refresh token expired");
        return Err(AuthErrorKind::RefreshTokenExpired);
    }

    let user = backend
        .db()
        .users()
        .find_by_id(stored.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get user: {}", e);
            AuthErrorKind::Store
        })?
        .ok_or_else(|| {
            tracing::warn!(user_id = stored.user_id, "Refresh token owner no longer exists");
            AuthErrorKind::UserNotFound
        })?;

    let issued = backend.jwt().issue_access_token(&user).map_err(|e| {
        tracing::error!("Failed to generate access token: {}", e);
        AuthErrorKind::Signing
    })?;

    let user_id = backend
        .jwt()
        .verify(&issued.token)
        .map_err(|e| {
            tracing::error!("Failed to read back reissued access token: {}", e);
            AuthErrorKind::Signing
        })?
        .user_id();
    if user_id <= 0 {
        return Err(AuthErrorKind::InvalidSubject);
    }

    tracing::info!(user_id, "Reissued access token");

    Ok(Authenticated {
        user_id,
        reissued_cookie: Some(
            backend
                .cookies()
                .token_cookie(ACCESS_COOKIE_NAME, &issued),
        ),
    })
}

/// Middleware guarding a router. Rejected requests never reach the handler.
///
/// ```ignore
/// Router::new()
///     .route("/me", get(me))
///     .layer(middleware::from_fn_with_state(state.clone(), require_auth::<MyState>))
/// ```
pub async fn require_auth<S>(State(state): State<S>, mut request: Request, next: Next) -> Response
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    let auth = match authenticate(request.headers(), &state).await {
        Ok(auth) => auth,
        Err(kind) => return AuthError::new(kind).into_response(),
    };

    request.extensions_mut().insert(AuthUserId(auth.user_id));
    let mut response = next.run(request).await;

    if let Some(value) = auth.reissued_cookie.as_deref().and_then(cookie_header) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }

    response
}
