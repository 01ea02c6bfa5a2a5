/// API key model and database operations
///
/// Each user has exactly one key. It is issued inside the sign-up
/// transaction and handed back on every sign-in, so it is stored as issued
/// rather than hashed.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE api_keys (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
///     key VARCHAR(128) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE UNIQUE INDEX api_keys_key_lower_key ON api_keys (lower(key));
/// ```
///
/// # Example
///
/// ```no_run
/// use dayplan_shared::models::api_key::ApiKey;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let key = ApiKey::get_or_issue(&pool, user_id).await?;
///
/// // Issuing again returns the same key
/// let again = ApiKey::get_or_issue(&pool, user_id).await?;
/// assert_eq!(key.key, again.key);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::user::UserAccount;
use crate::auth::api_key::generate_api_key;

/// API key row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,

    /// Owner (unique)
    pub user_id: Uuid,

    /// 40 hex characters
    pub key: String,

    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Returns the user's key, issuing one if they have none
    ///
    /// A single statement, so concurrent callers for the same user agree on
    /// one key.
    pub async fn get_or_issue<'e, E>(executor: E, user_id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (user_id, key)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, key, created_at
            "#,
        )
        .bind(user_id)
        .bind(generate_api_key())
        .fetch_one(executor)
        .await
    }

    /// Finds the account that owns `key`, ignoring case
    ///
    /// Inactive accounts are returned too; the caller decides what to do
    /// with them.
    pub async fn find_account(pool: &PgPool, key: &str) -> Result<Option<UserAccount>, sqlx::Error> {
        sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT u.id AS user_id, p.id AS profile_id, u.email, u.is_active, u.is_superuser
            FROM api_keys k
            JOIN users u ON u.id = k.user_id
            JOIN user_profiles p ON p.user_id = u.id
            WHERE lower(k.key) = lower($1)
            "#,
        )
        .bind(key)
        .fetch_optional(pool)
        .await
    }
}
