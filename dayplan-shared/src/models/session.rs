/// Session model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE sessions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     token_hash VARCHAR(64) NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     expires_at TIMESTAMPTZ NOT NULL
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::user::UserAccount;

/// Session row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,

    /// SHA-256 hex of the cookie token
    #[serde(skip_serializing)]
    pub token_hash: String,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// An active session joined with its account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionAccount {
    pub session_id: Uuid,

    #[sqlx(flatten)]
    pub account: UserAccount,
}

impl Session {
    /// Stores a new session that expires `ttl` from now
    pub async fn create<'e, E>(
        executor: E,
        user_id: Uuid,
        token_hash: &str,
        ttl: Duration,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, created_at, expires_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(Utc::now() + ttl)
        .fetch_one(executor)
        .await
    }

    /// Finds an unexpired session and the account behind it
    pub async fn find_active_account(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<SessionAccount>, sqlx::Error> {
        sqlx::query_as::<_, SessionAccount>(
            r#"
            SELECT s.id AS session_id, u.id AS user_id, p.id AS profile_id,
                   u.email, u.is_active, u.is_superuser
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            JOIN user_profiles p ON p.user_id = u.id
            WHERE s.token_hash = $1 AND s.expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(pool)
        .await
    }

    /// Deletes the session with this token hash, returning whether one existed
    pub async fn delete_by_token_hash(pool: &PgPool, token_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes every expired session
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
