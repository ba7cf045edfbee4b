//! Authentication state trait and macro.

use crate::db::Database;
use crate::jwt::JwtConfig;

use super::cookie::CookieSettings;

/// Trait for state types that provide what the auth guard needs.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
    fn cookies(&self) -> &CookieSettings;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard fields.
///
/// The struct must have these fields:
/// - `jwt: Arc<JwtConfig>`
/// - `db: Database`
/// - `cookies: Arc<CookieSettings>`
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub jwt: Arc<JwtConfig>,
///     pub cookies: Arc<CookieSettings>,
///     // ... other fields
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn cookies(&self) -> &$crate::auth::CookieSettings {
                &self.cookies
            }
        }
    };
}
