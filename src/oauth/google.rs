use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{
    IdentityProvider, ProviderError, ProviderIdentity, exchange_code, fetch_profile,
    require_email,
};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Nickname used when the Google profile has no display name.
const DEFAULT_NICKNAME: &str = "GoogleUser";

pub struct GoogleProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct GoogleProfile {
    id: String,
    email: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
}

impl GoogleProvider {
    pub fn new(
        client: reqwest::Client,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Self {
        Self {
            client,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
        }
    }
}

fn into_identity(profile: GoogleProfile) -> Result<ProviderIdentity, ProviderError> {
    let email = require_email(profile.email)?;
    let nickname = if profile.name.is_empty() {
        DEFAULT_NICKNAME.to_string()
    } else {
        profile.name.clone()
    };
    Ok(ProviderIdentity {
        provider_user_id: profile.id,
        email,
        name: profile.name,
        nickname,
        profile_image: profile.picture,
    })
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorize_url(&self, state: &str) -> Result<Url, ProviderError> {
        Ok(Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "profile email"),
                ("state", state),
                ("access_type", "offline"),
                ("prompt", "select_account"),
            ],
        )?)
    }

    async fn exchange(&self, code: &str, _state: &str) -> Result<ProviderIdentity, ProviderError> {
        let access_token = exchange_code(
            &self.client,
            TOKEN_URL,
            &[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ],
        )
        .await?;

        let profile: GoogleProfile =
            fetch_profile(&self.client, USERINFO_URL, &access_token).await?;
        into_identity(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url() {
        let provider = GoogleProvider::new(
            reqwest::Client::new(),
            "gid",
            "secret",
            "http://localhost:8000/api/v1/auth/google/callback",
        );

        let url = provider.authorize_url("xyz").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert!(pairs.contains(&("client_id".into(), "gid".into())));
        assert!(pairs.contains(&("scope".into(), "profile email".into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
        assert!(pairs.contains(&("prompt".into(), "select_account".into())));
        assert!(!url.as_str().contains("secret"));
    }

    #[test]
    fn test_profile_mapping() {
        let profile: GoogleProfile = serde_json::from_str(
            r#"{"id":"1234","email":"a@x.com","name":"Alice","picture":"https://p/a.png"}"#,
        )
        .unwrap();

        let identity = into_identity(profile).unwrap();

        assert_eq!(identity.provider_user_id, "1234");
        assert_eq!(identity.email, "a@x.com");
        assert_eq!(identity.nickname, "Alice");
        assert_eq!(identity.profile_image, "https://p/a.png");
    }

    #[test]
    fn test_nameless_profile_gets_default_nickname() {
        let profile: GoogleProfile =
            serde_json::from_str(r#"{"id":"1","email":"a@x.com"}"#).unwrap();

        let identity = into_identity(profile).unwrap();

        assert_eq!(identity.nickname, DEFAULT_NICKNAME);
        assert_eq!(identity.name, "");
    }

    #[test]
    fn test_missing_email_is_an_error() {
        let profile: GoogleProfile = serde_json::from_str(r#"{"id":"1","name":"A"}"#).unwrap();

        assert!(matches!(into_identity(profile), Err(ProviderError::MissingEmail)));
    }
}
