use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ADMIN" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

/// Identity provider a user first signed in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Kakao,
    Naver,
    Local,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Kakao => "kakao",
            OAuthProvider::Naver => "naver",
            OAuthProvider::Local => "local",
        }
    }

    /// Parse a provider tag. Unknown tags yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "google" => Some(OAuthProvider::Google),
            "kakao" => Some(OAuthProvider::Kakao),
            "naver" => Some(OAuthProvider::Naver),
            "local" => Some(OAuthProvider::Local),
            _ => None,
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub oauth_provider: OAuthProvider,
    pub email: String,
    pub name: String,
    pub nickname: String,
    pub profile_image: String,
    pub role: UserRole,
    pub visits_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    oauth_provider: String,
    email: String,
    name: String,
    nickname: String,
    profile_image: String,
    role: String,
    visits_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            // Rows are only ever written from the enum, fall back for hand-edited data
            oauth_provider: OAuthProvider::parse(&row.oauth_provider)
                .unwrap_or(OAuthProvider::Local),
            email: row.email,
            name: row.name,
            nickname: row.nickname,
            profile_image: row.profile_image,
            role: UserRole::from_str(&row.role),
            visits_count: row.visits_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields for a user that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub oauth_provider: OAuthProvider,
    pub email: String,
    pub name: String,
    pub nickname: String,
    pub profile_image: String,
    pub role: UserRole,
    pub visits_count: i64,
}

impl NewUser {
    /// A first-time OAuth sign-in: role USER, one visit.
    pub fn oauth(
        provider: OAuthProvider,
        email: &str,
        name: &str,
        nickname: &str,
        profile_image: &str,
    ) -> Self {
        Self {
            oauth_provider: provider,
            email: email.to_string(),
            name: name.to_string(),
            nickname: nickname.to_string(),
            profile_image: profile_image.to_string(),
            role: UserRole::User,
            visits_count: 1,
        }
    }

    /// A locally created account with a placeholder email.
    pub fn local(username: &str) -> Self {
        Self::oauth(
            OAuthProvider::Local,
            &format!("{}@dummy.local", username),
            username,
            username,
            "",
        )
    }
}

const USER_COLUMNS: &str = "id, oauth_provider, email, name, nickname, profile_image, role, visits_count, created_at, updated_at";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user. The store assigns the ID and both timestamps.
    pub async fn create(&self, user: &NewUser) -> Result<User, sqlx::Error> {
        let now = Utc::now();
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (oauth_provider, email, name, nickname, profile_image, role, visits_count, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user.oauth_provider.as_str())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.nickname)
        .bind(&user.profile_image)
        .bind(user.role.as_str())
        .bind(user.visits_count)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    /// Get a user by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by email. `Ok(None)` is the not-found branch callers use to
    /// decide between creating and reusing a row.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Overwrite the mutable fields of a stored user and bump `updated_at`.
    /// ID, email and `created_at` are never touched. Returns false if no row matched.
    pub async fn update(&self, user: &User) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users
                SET oauth_provider = ?,
                    name = ?,
                    nickname = ?,
                    profile_image = ?,
                    role = ?,
                    visits_count = ?,
                    updated_at = ?
              WHERE id = ?",
        )
        .bind(user.oauth_provider.as_str())
        .bind(&user.name)
        .bind(&user.nickname)
        .bind(&user.profile_image)
        .bind(user.role.as_str())
        .bind(user.visits_count)
        .bind(Utc::now())
        .bind(user.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List every user ordered by ID.
    pub async fn list_all(&self) -> Result<Vec<User>, sqlx::Error> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users ORDER BY id ASC", USER_COLUMNS))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
