//! Cookie-based JWT session authentication.
//!
//! Dual-token system: short-lived access tokens (15 min, stateless) and
//! long-lived refresh tokens (2 weeks, database-tracked). Expired or missing
//! access tokens are reissued by the `require_auth` middleware.

mod cookie;
mod errors;
mod extractors;
mod guard;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, CookieSettings, OAUTH_STATE_COOKIE_NAME, REFRESH_COOKIE_NAME,
    cookie_header, get_cookie,
};
pub use errors::{AuthError, AuthErrorKind};
pub use extractors::AuthUser;
pub use guard::{authenticate, require_auth};
pub use state::HasAuthBackend;
pub use types::{AuthUserId, Authenticated};
