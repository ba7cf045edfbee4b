//! JWT token generation and validation.
//!
//! Both token kinds share one HMAC secret and the subject format `user:<id>`.
//! Refresh tokens additionally carry `scope = "refresh"` and a random `jti`.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::User;

/// Issuer tag embedded in every token.
pub const ISSUER: &str = "step-journey";

/// Scope marker carried by refresh tokens.
pub const REFRESH_SCOPE: &str = "refresh";

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: i64 = 15 * 60;

/// Refresh token duration: 2 weeks
pub const REFRESH_TOKEN_DURATION_SECS: i64 = 14 * 24 * 60 * 60;

const SUBJECT_PREFIX: &str = "user:";

/// Claim set shared by access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, `user:<id>`
    pub sub: String,
    /// Issuer tag, not validated
    #[serde(default)]
    pub iss: String,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Refresh tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Refresh tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// The numeric user ID from the subject, or 0 when the subject is not
    /// `user:<positive integer>`. 0 never names a real user.
    pub fn user_id(&self) -> i64 {
        parse_subject(&self.sub).unwrap_or(0)
    }

    pub fn is_refresh(&self) -> bool {
        self.scope.as_deref() == Some(REFRESH_SCOPE)
    }
}

/// Build the subject claim for a user ID.
pub fn subject_for(user_id: i64) -> String {
    format!("{}{}", SUBJECT_PREFIX, user_id)
}

/// Parse `user:<id>` into a positive ID.
pub fn parse_subject(sub: &str) -> Option<i64> {
    let digits = sub.strip_prefix(SUBJECT_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i64>().ok().filter(|id| *id > 0)
}

/// A freshly signed token and its lifetime.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Token duration in seconds
    pub duration: i64,
}

/// Configuration for JWT operations. Owns the signing secret.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Generate a 15 minute access token carrying email and role.
    pub fn issue_access_token(&self, user: &User) -> Result<IssuedToken, TokenError> {
        self.issue_access_token_at(user, Utc::now())
    }

    pub fn issue_access_token_at(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let claims = Claims {
            sub: subject_for(user.id),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: Some(now.timestamp() + ACCESS_TOKEN_DURATION_SECS),
            email: Some(user.email.clone()),
            role: Some(user.role.as_str().to_string()),
            scope: None,
            jti: None,
        };
        self.sign(&claims, now, ACCESS_TOKEN_DURATION_SECS)
    }

    /// Generate a 2 week refresh token. The scope marker is informational,
    /// `verify` does not reject refresh tokens presented as access tokens.
    pub fn issue_refresh_token(&self, user: &User) -> Result<IssuedToken, TokenError> {
        self.issue_refresh_token_at(user, Utc::now())
    }

    pub fn issue_refresh_token_at(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let claims = Claims {
            sub: subject_for(user.id),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: Some(now.timestamp() + REFRESH_TOKEN_DURATION_SECS),
            email: None,
            role: None,
            scope: Some(REFRESH_SCOPE.to_string()),
            jti: Some(uuid::Uuid::new_v4().to_string()),
        };
        self.sign(&claims, now, REFRESH_TOKEN_DURATION_SECS)
    }

    fn sign(
        &self,
        claims: &Claims,
        now: DateTime<Utc>,
        duration: i64,
    ) -> Result<IssuedToken, TokenError> {
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(TokenError::Signing)?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at: now + Duration::seconds(duration),
            duration,
        })
    }

    /// Check the signature and expiry of a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Like `verify`, with an explicit clock. Issuer and audience are not checked.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(TokenError::from_decode)?
            .claims;

        match claims.exp {
            None => Err(TokenError::MissingClaim("exp")),
            Some(exp) if now.timestamp() > exp => Err(TokenError::Expired),
            Some(_) => Ok(claims),
        }
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("malformed token: {0}")]
    Malformed(#[source] jsonwebtoken::errors::Error),
    #[error("token signature does not match")]
    BadSignature,
    #[error("token uses an unexpected signing algorithm")]
    AlgorithmMismatch,
    #[error("token has expired")]
    Expired,
    #[error("token is missing the `{0}` claim")]
    MissingClaim(&'static str),
}

impl TokenError {
    fn from_decode(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::AlgorithmMismatch
            }
            _ => TokenError::Malformed(e),
        }
    }
}
