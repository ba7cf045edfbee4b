//! Refresh token storage.
//!
//! Only refresh tokens are persisted. Access tokens are stateless and
//! short-lived (15 minutes). Rows are keyed by the opaque token string, so a
//! user may hold several live refresh tokens across devices.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

/// A stored refresh token record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Whether the stored expiry is already behind `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expired_at
    }
}

/// Store for managing refresh tokens.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a refresh token, or on a token-string conflict overwrite the
    /// owning user and expiry. Concurrent writers of the same token are
    /// resolved by SQLite, last writer wins.
    pub async fn upsert(
        &self,
        user_id: i64,
        token: &str,
        expired_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token, expired_at, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (token) DO UPDATE
                SET user_id = excluded.user_id,
                    expired_at = excluded.expired_at",
        )
        .bind(user_id)
        .bind(token)
        .bind(expired_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up a refresh token by its string value.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, token, expired_at, created_at FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a token by its string value. Deleting an absent token is not an error.
    pub async fn delete_by_token(&self, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List every refresh token held by a user, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<RefreshToken>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, token, expired_at, created_at FROM refresh_tokens WHERE user_id = ? ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::db::{Database, NewUser};

    async fn setup() -> (Database, i64, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let alice = db.users().create(&NewUser::local("alice")).await.unwrap();
        let bob = db.users().create(&NewUser::local("bob")).await.unwrap();
        (db, alice.id, bob.id)
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let (db, alice, _) = setup().await;
        let expiry = chrono::Utc::now() + Duration::days(14);

        db.refresh_tokens()
            .upsert(alice, "token-a", expiry)
            .await
            .unwrap();

        let row = db
            .refresh_tokens()
            .find_by_token("token-a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.user_id, alice);
        assert_eq!(row.token, "token-a");
        assert_eq!(row.expired_at.timestamp(), expiry.timestamp());
    }

    #[tokio::test]
    async fn test_upsert_same_token_overwrites_owner_and_expiry() {
        let (db, alice, bob) = setup().await;
        let first = chrono::Utc::now() + Duration::days(1);
        let second = chrono::Utc::now() + Duration::days(7);

        db.refresh_tokens().upsert(alice, "shared", first).await.unwrap();
        let original = db
            .refresh_tokens()
            .find_by_token("shared")
            .await
            .unwrap()
            .unwrap();

        db.refresh_tokens().upsert(bob, "shared", second).await.unwrap();
        let row = db
            .refresh_tokens()
            .find_by_token("shared")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(row.id, original.id);
        assert_eq!(row.user_id, bob);
        assert_eq!(row.expired_at.timestamp(), second.timestamp());
        assert!(db.refresh_tokens().list_by_user(alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_may_hold_multiple_tokens() {
        let (db, alice, _) = setup().await;
        let expiry = chrono::Utc::now() + Duration::days(14);

        db.refresh_tokens().upsert(alice, "laptop", expiry).await.unwrap();
        db.refresh_tokens().upsert(alice, "phone", expiry).await.unwrap();

        let tokens = db.refresh_tokens().list_by_user(alice).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].token, "phone");
    }

    #[tokio::test]
    async fn test_find_missing_token_is_none() {
        let (db, _, _) = setup().await;

        assert!(
            db.refresh_tokens()
                .find_by_token("nope")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_delete_is_safe_when_absent() {
        let (db, alice, _) = setup().await;
        let expiry = chrono::Utc::now() + Duration::days(14);
        db.refresh_tokens().upsert(alice, "gone", expiry).await.unwrap();

        assert!(db.refresh_tokens().delete_by_token("gone").await.unwrap());
        assert!(!db.refresh_tokens().delete_by_token("gone").await.unwrap());
        assert!(
            db.refresh_tokens()
                .find_by_token("gone")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_expiry_check() {
        let now = chrono::Utc::now();
        let token = super::RefreshToken {
            id: 1,
            user_id: 1,
            token: "t".to_string(),
            expired_at: now,
            created_at: now - Duration::days(14),
        };

        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::seconds(1)));
    }
}
