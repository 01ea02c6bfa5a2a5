/// User profile model and database operations
///
/// A profile is the owner of tasks and the holder of the avatar. Exactly one
/// exists per user; it is created in the same transaction as the user.
/// Name and email live on the user row and are joined in when a profile is
/// read back ([`ProfileView`]).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE user_profiles (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
///     image_id UUID REFERENCES images(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use dayplan_shared::models::profile::UserProfile;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let profile = UserProfile::get_or_create(&pool, user_id).await?;
/// let view = UserProfile::find_view(&pool, profile.id).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::auth::authorization::Owned;

const PROFILE_COLUMNS: &str = "id, user_id, image_id, created_at, updated_at";

const VIEW_SELECT: &str = r#"
    SELECT p.id, p.user_id, u.first_name, u.last_name, u.email, p.image_id,
           i.original AS image_original, i.medium AS image_medium, i.small AS image_small
    FROM user_profiles p
    JOIN users u ON u.id = p.user_id
    LEFT JOIN images i ON i.id = p.image_id
"#;

/// Profile row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,

    /// Owning user (unique)
    pub user_id: Uuid,

    /// Current avatar; last writer wins
    pub image_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for UserProfile {
    fn owner_profile_id(&self) -> Uuid {
        self.id
    }
}

/// A profile joined with its user and image, as read back to clients
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProfileView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image_id: Option<Uuid>,
    pub image_original: Option<String>,
    pub image_medium: Option<String>,
    pub image_small: Option<String>,
}

impl Owned for ProfileView {
    fn owner_profile_id(&self) -> Uuid {
        self.id
    }
}

impl UserProfile {
    /// Returns the user's profile, creating it if missing
    pub async fn get_or_create<'e, E>(executor: E, user_id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, UserProfile>(&format!(
            r#"
            INSERT INTO user_profiles (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Points the profile at a new image
    ///
    /// Returns the number of rows updated (0 when the profile is gone).
    pub async fn set_image<'e, E>(
        executor: E,
        profile_id: Uuid,
        image_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE user_profiles SET image_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(profile_id)
        .bind(image_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes the profile row, returning it
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, UserProfile>(&format!(
            "DELETE FROM user_profiles WHERE id = $1 RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Reads one profile with its user and image
    pub async fn find_view(pool: &PgPool, id: Uuid) -> Result<Option<ProfileView>, sqlx::Error> {
        sqlx::query_as::<_, ProfileView>(&format!("{VIEW_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Reads a page of profiles, ordered by creation time
    pub async fn list_views(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ProfileView>, sqlx::Error> {
        sqlx::query_as::<_, ProfileView>(&format!(
            "{VIEW_SELECT} ORDER BY p.created_at, p.id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_profiles")
            .fetch_one(pool)
            .await
    }
}
