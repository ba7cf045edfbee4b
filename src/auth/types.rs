//! Authentication result types.

/// Authenticated user ID placed in request extensions by `require_auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUserId(pub i64);

/// Outcome of a successful authentication.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user_id: i64,
    /// `Set-Cookie` value for a reissued access token, if one was minted
    pub reissued_cookie: Option<String>,
}
