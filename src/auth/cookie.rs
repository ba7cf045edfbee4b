//! Cookie parsing and `Set-Cookie` construction for session tokens.

use axum::http::{HeaderValue, header};
use chrono::{DateTime, Utc};

use crate::jwt::IssuedToken;

/// Cookie name for the access token (short-lived, 15 minutes).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token (long-lived, 2 weeks).
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Cookie holding the OAuth `state` value between login and callback.
pub const OAUTH_STATE_COOKIE_NAME: &str = "oauth_state";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Attributes shared by every cookie the server sets.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub domain: String,
    pub secure: bool,
}

impl CookieSettings {
    pub fn new(domain: impl Into<String>, secure: bool) -> Self {
        Self {
            domain: domain.into(),
            secure,
        }
    }

    /// Format a cookie that lives for `max_age` seconds from `now`.
    /// A negative `max_age` produces a deletion cookie.
    pub fn build(&self, name: &str, value: &str, max_age: i64, now: DateTime<Utc>) -> String {
        let expires = if max_age < 0 {
            DateTime::<Utc>::UNIX_EPOCH
        } else {
            now + chrono::Duration::seconds(max_age)
        };
        let max_age = max_age.max(0);
        let secure = if self.secure { "; Secure" } else { "" };
        format!(
            "{}={}; Path=/; Domain={}; Max-Age={}; Expires={}; HttpOnly; SameSite=Lax{}",
            name,
            value,
            self.domain,
            max_age,
            http_date(expires),
            secure
        )
    }

    /// Cookie carrying a freshly issued token, expiring with it.
    pub fn token_cookie(&self, name: &str, issued: &IssuedToken) -> String {
        self.build(name, &issued.token, issued.duration, issued.issued_at)
    }

    /// Cookie that tells the browser to drop `name` immediately.
    pub fn clear(&self, name: &str) -> String {
        self.build(name, "", -1, Utc::now())
    }
}

/// Convert a formatted cookie into a header value.
pub fn cookie_header(cookie: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(cookie).ok()
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
