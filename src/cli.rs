//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::oauth::{OAuthSecrets, Providers};
use clap::Parser;
use tracing::{error, info, warn};
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Secret used when running locally without `JWT_SECRET`.
const LOCAL_JWT_SECRET: &str = "local-dev-secret";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Deployment environment. Only `local` relaxes secret and cookie checks.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Local,
    Dev,
    Prod,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "step-journey",
    about = "OAuth login backend with cookie-based JWT sessions"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "step-journey.db")]
    pub database: String,

    /// Deployment environment
    #[arg(short, long, env = "ENVIRONMENT", default_value = "local")]
    pub environment: Environment,

    /// Domain attribute for session cookies
    #[arg(long, env = "COOKIE_DOMAIN", default_value = "localhost")]
    pub cookie_domain: String,

    /// Where to send the browser after a successful login
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:5173")]
    pub frontend_url: String,

    /// Public URL of this server, used for provider callback URLs
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8000")]
    pub backend_url: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// All OAuth credentials as one JSON document
    #[arg(long, env = "OAUTH_SECRET", hide_env_values = true)]
    pub oauth_secret: Option<String>,

    #[arg(long, env = "OAUTH_GOOGLE_CLIENT_ID", default_value = "")]
    pub google_client_id: String,

    #[arg(long, env = "OAUTH_GOOGLE_CLIENT_SECRET", hide_env_values = true, default_value = "")]
    pub google_client_secret: String,

    #[arg(long, env = "OAUTH_NAVER_CLIENT_ID", default_value = "")]
    pub naver_client_id: String,

    #[arg(long, env = "OAUTH_NAVER_CLIENT_SECRET", hide_env_values = true, default_value = "")]
    pub naver_client_secret: String,

    #[arg(long, env = "OAUTH_KAKAO_REST_API_KEY", hide_env_values = true, default_value = "")]
    pub kakao_rest_api_key: String,

    #[arg(long, env = "OAUTH_KAKAO_CLIENT_SECRET", hide_env_values = true, default_value = "")]
    pub kakao_client_secret: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>, environment: Environment) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else if environment == Environment::Local {
        warn!("JWT_SECRET not set, using the local development secret");
        return Some(LOCAL_JWT_SECRET.to_string());
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    check_secret_length(&secret, environment).then_some(secret)
}

fn check_secret_length(secret: &str, environment: Environment) -> bool {
    if secret.len() >= MIN_JWT_SECRET_LENGTH {
        return true;
    }
    if environment == Environment::Local {
        warn!(
            "JWT secret is shorter than {} characters",
            MIN_JWT_SECRET_LENGTH
        );
        return true;
    }
    error!(
        "JWT secret is shorter than {} characters. Use a longer secret",
        MIN_JWT_SECRET_LENGTH
    );
    false
}

/// Load OAuth credentials once at startup.
/// `OAUTH_SECRET` wins over the individual variables when set.
pub fn load_oauth_secrets(args: &Args) -> Option<OAuthSecrets> {
    let individual = OAuthSecrets {
        google_client_id: args.google_client_id.clone(),
        google_client_secret: args.google_client_secret.clone(),
        naver_client_id: args.naver_client_id.clone(),
        naver_client_secret: args.naver_client_secret.clone(),
        kakao_rest_api_key: args.kakao_rest_api_key.clone(),
        kakao_client_secret: args.kakao_client_secret.clone(),
    };

    match resolve_oauth_secrets(args.oauth_secret.as_deref(), individual) {
        Ok(secrets) => Some(secrets),
        Err(e) => {
            error!(error = %e, "OAUTH_SECRET is not valid JSON");
            None
        }
    }
}

fn resolve_oauth_secrets(
    json: Option<&str>,
    individual: OAuthSecrets,
) -> Result<OAuthSecrets, serde_json::Error> {
    match json.map(str::trim).filter(|j| !j.is_empty()) {
        Some(json) => OAuthSecrets::from_json(json),
        None => Ok(individual),
    }
}

/// Parse a URL argument, logging an error on failure.
pub fn parse_url(name: &str, value: &str) -> Option<Url> {
    match Url::parse(value) {
        Ok(url) => Some(url),
        Err(e) => {
            error!(name = %name, url = %value, error = %e, "Invalid URL");
            None
        }
    }
}

/// Whether session cookies get the `Secure` flag.
pub fn cookie_secure(environment: Environment, cookie_domain: &str) -> bool {
    let plain_http_domain = matches!(cookie_domain, "localhost" | "127.0.0.1");
    environment != Environment::Local && !plain_http_domain
}

/// Build the provider registry, logging errors if it fails.
pub fn build_providers(secrets: &OAuthSecrets, backend_url: &Url) -> Option<Providers> {
    match Providers::from_secrets(secrets, backend_url) {
        Ok(providers) => {
            if providers.is_empty() {
                warn!("No OAuth providers configured, every login route will return 404");
            } else {
                info!(count = providers.len(), "OAuth providers configured");
            }
            Some(providers)
        }
        Err(e) => {
            error!(error = %e, "Failed to configure OAuth providers");
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    jwt_secret: String,
    environment: Environment,
    cookie_domain: String,
    frontend_url: Url,
    backend_url: Url,
    providers: Providers,
) -> ServerConfig {
    let secure_cookies = cookie_secure(environment, &cookie_domain);

    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        cookie_domain,
        secure_cookies,
        frontend_url,
        backend_url,
        providers,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_secure() {
        assert!(!cookie_secure(Environment::Local, "example.com"));
        assert!(!cookie_secure(Environment::Prod, "localhost"));
        assert!(!cookie_secure(Environment::Dev, "127.0.0.1"));
        assert!(cookie_secure(Environment::Prod, "example.com"));
        assert!(cookie_secure(Environment::Dev, "dev.example.com"));
    }

    #[test]
    fn test_short_secret_only_allowed_locally() {
        assert!(check_secret_length("short", Environment::Local));
        assert!(!check_secret_length("short", Environment::Prod));
        assert!(check_secret_length(&"x".repeat(32), Environment::Prod));
    }

    #[test]
    fn test_oauth_json_wins_over_individual_values() {
        let individual = OAuthSecrets {
            google_client_id: "from-env".to_string(),
            ..Default::default()
        };

        let secrets =
            resolve_oauth_secrets(Some(r#"{"naver_client_id":"n"}"#), individual.clone()).unwrap();
        assert_eq!(secrets.naver_client_id, "n");
        assert!(secrets.google_client_id.is_empty());

        let secrets = resolve_oauth_secrets(Some("  "), individual.clone()).unwrap();
        assert_eq!(secrets.google_client_id, "from-env");

        let secrets = resolve_oauth_secrets(None, individual).unwrap();
        assert_eq!(secrets.google_client_id, "from-env");
    }

    #[test]
    fn test_oauth_json_rejects_unknown_fields() {
        assert!(resolve_oauth_secrets(Some(r#"{"typo_id":"x"}"#), OAuthSecrets::default()).is_err());
    }

    #[test]
    fn test_build_providers_without_client_ids() {
        let backend = Url::parse("http://localhost:8000").unwrap();

        let providers = build_providers(&OAuthSecrets::default(), &backend).unwrap();
        assert!(providers.is_empty());

        let secrets = OAuthSecrets {
            kakao_rest_api_key: "kkey".to_string(),
            ..Default::default()
        };
        let providers = build_providers(&secrets, &backend).unwrap();
        assert_eq!(providers.len(), 1);
        assert!(!providers.is_empty());
    }

    #[test]
    fn test_parse_url() {
        assert!(parse_url("frontend", "http://localhost:5173").is_some());
        assert!(parse_url("frontend", "not a url").is_none());
    }
}
