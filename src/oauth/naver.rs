use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{
    IdentityProvider, ProviderError, ProviderIdentity, exchange_code, fetch_profile,
    require_email,
};

const AUTHORIZE_URL: &str = "https://nid.naver.com/oauth2.0/authorize";
const TOKEN_URL: &str = "https://nid.naver.com/oauth2.0/token";
const PROFILE_URL: &str = "https://openapi.naver.com/v1/nid/me";

/// Naver login. The token exchange also carries the `state` value.
pub struct NaverProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct NaverProfile {
    response: NaverAccount,
}

#[derive(Debug, Deserialize)]
struct NaverAccount {
    id: String,
    email: Option<String>,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    profile_image: String,
}

impl NaverProvider {
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

fn into_identity(profile: NaverProfile) -> Result<ProviderIdentity, ProviderError> {
    let account = profile.response;
    let email = require_email(account.email)?;
    // Nickname is optional on Naver, the real name is always present
    let display = if account.nickname.is_empty() {
        account.name
    } else {
        account.nickname
    };
    Ok(ProviderIdentity {
        provider_user_id: account.id,
        email,
        name: display.clone(),
        nickname: display,
        profile_image: account.profile_image,
    })
}

#[async_trait]
impl IdentityProvider for NaverProvider {
    fn authorize_url(&self, state: &str) -> Result<Url, ProviderError> {
        Ok(Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("state", state),
            ],
        )?)
    }

    async fn exchange(&self, code: &str, state: &str) -> Result<ProviderIdentity, ProviderError> {
        let access_token = exchange_code(
            &self.client,
            TOKEN_URL,
            &[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("state", state),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
        )
        .await?;

        let profile: NaverProfile = fetch_profile(&self.client, PROFILE_URL, &access_token).await?;
        into_identity(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url() {
        let provider = NaverProvider::new(reqwest::Client::new(), "nid", "nsecret", "http://cb");

        let url = provider.authorize_url("st").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("nid.naver.com"));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("state".into(), "st".into())));
        assert!(!url.as_str().contains("nsecret"));
    }

    #[test]
    fn test_nickname_falls_back_to_name() {
        let profile: NaverProfile = serde_json::from_str(
            r#"{"resultcode":"00","message":"success","response":{"id":"n-1","email":"n@naver.com","name":"Hong"}}"#,
        )
        .unwrap();

        let identity = into_identity(profile).unwrap();

        assert_eq!(identity.provider_user_id, "n-1");
        assert_eq!(identity.nickname, "Hong");
        assert_eq!(identity.name, "Hong");
    }

    #[test]
    fn test_nickname_preferred() {
        let profile: NaverProfile = serde_json::from_str(
            r#"{"response":{"id":"n-2","email":"n@naver.com","name":"Hong","nickname":"gildong","profile_image":"https://n/p.png"}}"#,
        )
        .unwrap();

        let identity = into_identity(profile).unwrap();

        assert_eq!(identity.nickname, "gildong");
        assert_eq!(identity.profile_image, "https://n/p.png");
    }

    #[test]
    fn test_missing_email_is_an_error() {
        let profile: NaverProfile =
            serde_json::from_str(r#"{"response":{"id":"n-3","email":""}}"#).unwrap();

        assert!(matches!(into_identity(profile), Err(ProviderError::MissingEmail)));
    }
}
