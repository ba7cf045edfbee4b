//! Third-party OAuth identity providers.
//!
//! Each provider turns an authorization code into a verified identity. The
//! set of configured providers is fixed at startup from `OAuthSecrets`.

mod google;
mod kakao;
mod naver;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use rand::RngCore;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::db::OAuthProvider;

pub use google::GoogleProvider;
pub use kakao::KakaoProvider;
pub use naver::NaverProvider;

/// Timeout for every outbound provider call.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity returned by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub provider_user_id: String,
    pub email: String,
    pub name: String,
    pub nickname: String,
    pub profile_image: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{stage} returned status {status}")]
    Status {
        stage: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("provider did not return an email address")]
    MissingEmail,
    #[error("invalid provider URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A provider that can authenticate a user by authorization code.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start the login.
    fn authorize_url(&self, state: &str) -> Result<Url, ProviderError>;

    /// Exchange an authorization code for the user's identity.
    async fn exchange(&self, code: &str, state: &str) -> Result<ProviderIdentity, ProviderError>;
}

/// OAuth client credentials, loaded once at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OAuthSecrets {
    pub google_client_id: String,
    pub google_client_secret: String,
    pub naver_client_id: String,
    pub naver_client_secret: String,
    pub kakao_rest_api_key: String,
    pub kakao_client_secret: String,
}

impl OAuthSecrets {
    /// Parse the `OAUTH_SECRET` JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Registry of configured providers keyed by tag.
#[derive(Clone, Default)]
pub struct Providers {
    providers: HashMap<OAuthProvider, Arc<dyn IdentityProvider>>,
}

impl Providers {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register (or replace) the provider for `tag`.
    pub fn with(mut self, tag: OAuthProvider, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(tag, provider);
        self
    }

    pub fn get(&self, tag: OAuthProvider) -> Option<Arc<dyn IdentityProvider>> {
        self.providers.get(&tag).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Build every provider that has a client id. Callback URLs are derived
    /// from `backend_url`.
    pub fn from_secrets(secrets: &OAuthSecrets, backend_url: &Url) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let mut providers = Self::empty();

        if !secrets.google_client_id.is_empty() {
            providers = providers.with(
                OAuthProvider::Google,
                Arc::new(GoogleProvider::new(
                    client.clone(),
                    &secrets.google_client_id,
                    &secrets.google_client_secret,
                    &callback_url(backend_url, OAuthProvider::Google),
                )),
            );
        }
        if !secrets.kakao_rest_api_key.is_empty() {
            providers = providers.with(
                OAuthProvider::Kakao,
                Arc::new(KakaoProvider::new(
                    client.clone(),
                    &secrets.kakao_rest_api_key,
                    &secrets.kakao_client_secret,
                    &callback_url(backend_url, OAuthProvider::Kakao),
                )),
            );
        }
        if !secrets.naver_client_id.is_empty() {
            providers = providers.with(
                OAuthProvider::Naver,
                Arc::new(NaverProvider::new(
                    client,
                    &secrets.naver_client_id,
                    &secrets.naver_client_secret,
                    &callback_url(backend_url, OAuthProvider::Naver),
                )),
            );
        }

        Ok(providers)
    }
}

/// Redirect URI registered with the provider.
pub fn callback_url(backend_url: &Url, provider: OAuthProvider) -> String {
    format!(
        "{}/api/v1/auth/{}/callback",
        backend_url.as_str().trim_end_matches('/'),
        provider
    )
}

/// Random value for the OAuth `state` parameter.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// POST a form to a token endpoint and return the access token.
async fn exchange_code(
    client: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<String, ProviderError> {
    let response = client.post(token_url).form(form).send().await?;
    if !response.status().is_success() {
        return Err(ProviderError::Status {
            stage: "token exchange",
            status: response.status(),
        });
    }
    Ok(response.json::<TokenResponse>().await?.access_token)
}

/// GET a profile endpoint with a bearer token.
async fn fetch_profile<T: DeserializeOwned>(
    client: &reqwest::Client,
    profile_url: &str,
    access_token: &str,
) -> Result<T, ProviderError> {
    let response = client
        .get(profile_url)
        .bearer_auth(access_token)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(ProviderError::Status {
            stage: "profile request",
            status: response.status(),
        });
    }
    Ok(response.json::<T>().await?)
}

/// An empty email is a hard failure for every provider.
fn require_email(email: Option<String>) -> Result<String, ProviderError> {
    match email {
        Some(email) if !email.trim().is_empty() => Ok(email),
        _ => Err(ProviderError::MissingEmail),
    }
}
