//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response, header},
};
use chrono::{DateTime, Utc};
use step_journey::{
    ServerConfig, create_app,
    db::{Database, NewUser, OAuthProvider, User},
    jwt::JwtConfig,
    oauth::{IdentityProvider, ProviderError, ProviderIdentity, Providers},
};
use url::Url;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret";
pub const FRONTEND_URL: &str = "http://localhost:5173";
pub const BACKEND_URL: &str = "http://localhost:8000";

/// Identity provider that answers from memory and counts exchanges.
pub struct FakeProvider {
    identity: Option<ProviderIdentity>,
    exchanges: AtomicUsize,
}

impl FakeProvider {
    pub fn returning(email: &str, nickname: &str) -> Arc<Self> {
        Arc::new(Self {
            identity: Some(ProviderIdentity {
                provider_user_id: format!("fake-{}", nickname),
                email: email.to_string(),
                name: nickname.to_string(),
                nickname: nickname.to_string(),
                profile_image: format!("https://img.test/{}.png", nickname),
            }),
            exchanges: AtomicUsize::new(0),
        })
    }

    /// A provider whose code exchange always fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            identity: None,
            exchanges: AtomicUsize::new(0),
        })
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorize_url(&self, state: &str) -> Result<Url, ProviderError> {
        Ok(Url::parse_with_params(
            "https://provider.test/authorize",
            &[("state", state)],
        )?)
    }

    async fn exchange(&self, _code: &str, _state: &str) -> Result<ProviderIdentity, ProviderError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        self.identity.clone().ok_or(ProviderError::MissingEmail)
    }
}

pub struct TestApp {
    pub app: axum::Router,
    pub db: Database,
    pub jwt: JwtConfig,
}

/// Create a test app backed by an in-memory database.
pub async fn create_test_app(providers: Providers) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: JWT_SECRET.to_vec(),
        cookie_domain: "localhost".to_string(),
        secure_cookies: false,
        frontend_url: Url::parse(FRONTEND_URL).expect("Invalid URL"),
        backend_url: Url::parse(BACKEND_URL).expect("Invalid URL"),
        providers,
    };
    TestApp {
        app: create_app(&config),
        db,
        jwt: JwtConfig::new(JWT_SECRET),
    }
}

pub async fn create_user(db: &Database, email: &str, nickname: &str) -> User {
    db.users()
        .create(&NewUser::oauth(
            OAuthProvider::Google,
            email,
            nickname,
            nickname,
            "",
        ))
        .await
        .expect("Failed to create user")
}

/// Issue a refresh token for `user` and store it with the given expiry.
pub async fn stored_refresh_token(
    db: &Database,
    jwt: &JwtConfig,
    user: &User,
    expires_at: DateTime<Utc>,
) -> String {
    let refresh = jwt.issue_refresh_token(user).expect("Failed to issue refresh token");
    db.refresh_tokens()
        .upsert(user.id, &refresh.token, expires_at)
        .await
        .expect("Failed to store refresh token");
    refresh.token
}

/// Cookie header with a fresh access token for `user`.
pub fn access_cookie(jwt: &JwtConfig, user: &User) -> String {
    let access = jwt.issue_access_token(user).expect("Failed to issue access token");
    format!("access_token={}", access.token)
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn send_json(method: &str, uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// All `Set-Cookie` values of a response.
pub fn set_cookies<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The `name=value` pair of the `Set-Cookie` for `name`, if any.
pub fn cookie_pair(set_cookies: &[String], name: &str) -> Option<String> {
    set_cookies
        .iter()
        .find(|c| c.starts_with(&format!("{}=", name)))
        .and_then(|c| c.split(';').next())
        .map(str::to_string)
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
