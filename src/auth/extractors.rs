//! Axum extractors for authenticated handlers.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::{AuthError, AuthErrorKind};
use super::types::AuthUserId;

/// The authenticated user's ID, as resolved by `require_auth`.
///
/// Rejects with 401 when the guard did not run or left no usable ID, so a
/// handler mounted outside the guard fails closed.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i64);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthUserId>() {
            Some(AuthUserId(id)) if *id > 0 => Ok(AuthUser(*id)),
            _ => Err(AuthError::new(AuthErrorKind::InvalidSubject)),
        }
    }
}
