//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Why a request could not be authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No usable access token and no refresh cookie
    NoCredentials,
    RefreshTokenNotFound,
    RefreshTokenExpired,
    UserNotFound,
    /// Authenticated ID was missing or not positive
    InvalidSubject,
    /// The user or token store failed
    Store,
    /// A new access token could not be signed or re-read
    Signing,
}

/// Guard rejection. Clients only ever see a generic message.
#[derive(Debug)]
pub struct AuthError {
    pub kind: AuthErrorKind,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::Store | AuthErrorKind::Signing => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::Store | AuthErrorKind::Signing => "Internal server error",
            _ => "Unauthorized",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
