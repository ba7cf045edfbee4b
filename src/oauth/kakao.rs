use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{
    IdentityProvider, ProviderError, ProviderIdentity, exchange_code, fetch_profile,
    require_email,
};

const AUTHORIZE_URL: &str = "https://kauth.kakao.com/oauth/authorize";
const TOKEN_URL: &str = "https://kauth.kakao.com/oauth/token";
const PROFILE_URL: &str = "https://kapi.kakao.com/v2/user/me";

/// Kakao login. The client secret is optional and only sent when set.
pub struct KakaoProvider {
    client: reqwest::Client,
    rest_api_key: String,
    client_secret: String,
    redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct KakaoProfile {
    id: i64,
    #[serde(default)]
    kakao_account: KakaoAccount,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoAccount {
    email: Option<String>,
    #[serde(default)]
    profile: KakaoProfileDetails,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoProfileDetails {
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    profile_image_url: String,
}

impl KakaoProvider {
    pub fn new(
        client: reqwest::Client,
        rest_api_key: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Self {
        Self {
            client,
            rest_api_key: rest_api_key.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
        }
    }
}

fn into_identity(profile: KakaoProfile) -> Result<ProviderIdentity, ProviderError> {
    let account = profile.kakao_account;
    let email = require_email(account.email)?;
    Ok(ProviderIdentity {
        provider_user_id: profile.id.to_string(),
        email,
        name: account.profile.nickname.clone(),
        nickname: account.profile.nickname,
        profile_image: account.profile.profile_image_url,
    })
}

#[async_trait]
impl IdentityProvider for KakaoProvider {
    fn authorize_url(&self, state: &str) -> Result<Url, ProviderError> {
        Ok(Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.rest_api_key.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "account_email"),
                ("state", state),
            ],
        )?)
    }

    async fn exchange(&self, code: &str, _state: &str) -> Result<ProviderIdentity, ProviderError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.rest_api_key.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
        ];
        if !self.client_secret.is_empty() {
            form.push(("client_secret", self.client_secret.as_str()));
        }

        let access_token = exchange_code(&self.client, TOKEN_URL, &form).await?;
        let profile: KakaoProfile = fetch_profile(&self.client, PROFILE_URL, &access_token).await?;
        into_identity(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url_requests_email_scope() {
        let provider = KakaoProvider::new(reqwest::Client::new(), "kkey", "", "http://cb");

        let url = provider.authorize_url("s1").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("kauth.kakao.com"));
        assert!(pairs.contains(&("client_id".into(), "kkey".into())));
        assert!(pairs.contains(&("scope".into(), "account_email".into())));
        assert!(pairs.contains(&("state".into(), "s1".into())));
    }

    #[test]
    fn test_profile_mapping() {
        let profile: KakaoProfile = serde_json::from_str(
            r#"{
                "id": 987654321,
                "kakao_account": {
                    "email": "k@kakao.com",
                    "profile": {"nickname": "kim", "profile_image_url": "https://k/img.jpg"}
                }
            }"#,
        )
        .unwrap();

        let identity = into_identity(profile).unwrap();

        assert_eq!(identity.provider_user_id, "987654321");
        assert_eq!(identity.email, "k@kakao.com");
        assert_eq!(identity.name, "kim");
        assert_eq!(identity.nickname, "kim");
        assert_eq!(identity.profile_image, "https://k/img.jpg");
    }

    #[test]
    fn test_account_without_email_is_an_error() {
        let profile: KakaoProfile = serde_json::from_str(r#"{"id": 1}"#).unwrap();

        assert!(matches!(into_identity(profile), Err(ProviderError::MissingEmail)));
    }
}
