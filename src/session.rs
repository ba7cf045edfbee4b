//! Login orchestration: user upsert, token issuance and session cookies.

use std::sync::Arc;

use crate::auth::{ACCESS_COOKIE_NAME, CookieSettings, REFRESH_COOKIE_NAME};
use crate::db::{Database, NewUser, OAuthProvider, User};
use crate::jwt::{IssuedToken, JwtConfig, TokenError};
use crate::oauth::ProviderIdentity;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to record visit: {0}")]
    VisitUpdate(#[source] sqlx::Error),
    #[error("user {0} disappeared during login")]
    UserMissing(i64),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("failed to persist refresh token: {0}")]
    Persist(#[source] sqlx::Error),
    #[error("user store failed: {0}")]
    Store(#[source] sqlx::Error),
}

/// Tokens and cookies produced by a successful login.
#[derive(Debug)]
pub struct LoginSession {
    /// The user as stored after the visit was recorded
    pub user: User,
    pub access_token: IssuedToken,
    pub refresh_token: IssuedToken,
    pub access_cookie: String,
    pub refresh_cookie: String,
}

impl LoginSession {
    pub fn cookies(&self) -> [&str; 2] {
        [self.access_cookie.as_str(), self.refresh_cookie.as_str()]
    }
}

#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    jwt: Arc<JwtConfig>,
    cookies: Arc<CookieSettings>,
}

impl SessionManager {
    pub fn new(db: Database, jwt: Arc<JwtConfig>, cookies: Arc<CookieSettings>) -> Self {
        Self { db, jwt, cookies }
    }

    /// Find the user owning `identity.email`, creating it on first login.
    ///
    /// An existing row is returned unchanged, so the stored provider tag
    /// stays whatever provider first created it.
    pub async fn upsert_identity(
        &self,
        provider: OAuthProvider,
        identity: &ProviderIdentity,
    ) -> Result<User, SessionError> {
        if let Some(user) = self.find_by_email(&identity.email).await? {
            return Ok(user);
        }

        let new_user = NewUser::oauth(
            provider,
            &identity.email,
            &identity.name,
            &identity.nickname,
            &identity.profile_image,
        );
        match self.db.users().create(&new_user).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, provider = %provider, "Created user");
                Ok(user)
            }
            // Lost a race with a concurrent first login for the same email
            Err(e) if is_unique_violation(&e) => self
                .find_by_email(&identity.email)
                .await?
                .ok_or(SessionError::Store(e)),
            Err(e) => Err(SessionError::Store(e)),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, SessionError> {
        self.db
            .users()
            .find_by_email(email)
            .await
            .map_err(SessionError::Store)
    }

    /// Record a visit, issue both tokens, persist the refresh token and
    /// build the session cookies. Steps are not rolled back on failure.
    pub async fn login_and_issue_session(&self, mut user: User) -> Result<LoginSession, SessionError> {
        user.visits_count += 1;
        match self.db.users().update(&user).await {
            Ok(true) => {}
            Ok(false) => return Err(SessionError::UserMissing(user.id)),
            Err(e) => return Err(SessionError::VisitUpdate(e)),
        }

        let refresh_token = self.jwt.issue_refresh_token(&user)?;
        self.db
            .refresh_tokens()
            .upsert(user.id, &refresh_token.token, refresh_token.expires_at)
            .await
            .map_err(SessionError::Persist)?;

        let access_token = self.jwt.issue_access_token(&user)?;

        tracing::info!(
            user_id = user.id,
            visits = user.visits_count,
            "User logged in"
        );

        Ok(LoginSession {
            access_cookie: self.cookies.token_cookie(ACCESS_COOKIE_NAME, &access_token),
            refresh_cookie: self.cookies.token_cookie(REFRESH_COOKIE_NAME, &refresh_token),
            user,
            access_token,
            refresh_token,
        })
    }

    /// Cookies that drop both tokens from the browser. Stored refresh tokens
    /// stay valid until they expire.
    pub fn logout_cookies(&self) -> [String; 2] {
        [
            self.cookies.clear(ACCESS_COOKIE_NAME),
            self.cookies.clear(REFRESH_COOKIE_NAME),
        ]
    }

    /// Delete a stored refresh token. Returns false if it was not stored.
    pub async fn revoke(&self, refresh_token: &str) -> Result<bool, SessionError> {
        self.db
            .refresh_tokens()
            .delete_by_token(refresh_token)
            .await
            .map_err(SessionError::Store)
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}
