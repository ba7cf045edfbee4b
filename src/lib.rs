pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod oauth;
pub mod session;

use api::create_api_router;
use auth::CookieSettings;
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use db::Database;
use jwt::JwtConfig;
use oauth::Providers;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use url::Url;

/// Prefix for every API route.
pub const API_PREFIX: &str = "/api/v1";

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Domain attribute of session cookies
    pub cookie_domain: String,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Redirect target after a successful OAuth login
    pub frontend_url: Url,
    /// Public URL of this service, used for OAuth callbacks
    pub backend_url: Url,
    /// Configured OAuth identity providers
    pub providers: Providers,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));
    let cookies = Arc::new(CookieSettings::new(
        config.cookie_domain.clone(),
        config.secure_cookies,
    ));

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        cookies,
        config.providers.clone(),
        config.frontend_url.clone(),
    );

    Router::new()
        .nest(API_PREFIX, api_router)
        .layer(cors_layer(&[&config.frontend_url, &config.backend_url]))
}

/// CORS for the browser frontend. Credentials are allowed, so origins are
/// listed explicitly.
fn cors_layer(origins: &[&Url]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|url| url.origin().ascii_serialization().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}
