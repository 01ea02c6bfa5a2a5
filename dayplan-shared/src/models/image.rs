/// Uploaded profile images
///
/// An image row records where the three renditions of one upload were
/// stored. The paths are storage keys; turning them into URLs is the job of
/// [`MediaStorage::url`](crate::media::MediaStorage::url).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE images (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     original VARCHAR(512) NOT NULL,
///     medium VARCHAR(512) NOT NULL,
///     small VARCHAR(512) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::media::StoredRenditions;

/// Image row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: Uuid,
    pub original: String,
    pub medium: String,
    pub small: String,
    pub created_at: DateTime<Utc>,
}

impl Image {
    /// Storage paths of all three renditions
    pub fn paths(&self) -> [&str; 3] {
        [
            self.original.as_str(),
            self.medium.as_str(),
            self.small.as_str(),
        ]
    }

    pub async fn create<'e, E>(executor: E, stored: &StoredRenditions) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Image>(
            r#"
            INSERT INTO images (original, medium, small)
            VALUES ($1, $2, $3)
            RETURNING id, original, medium, small, created_at
            "#,
        )
        .bind(&stored.original)
        .bind(&stored.medium)
        .bind(&stored.small)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Image>(
            "SELECT id, original, medium, small, created_at FROM images WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Deletes the image unless a profile still points at it
    ///
    /// Returns the deleted row so the caller can remove the files.
    pub async fn delete_if_unreferenced<'e, E>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Image>(
            r#"
            DELETE FROM images
            WHERE id = $1
              AND NOT EXISTS (SELECT 1 FROM user_profiles WHERE image_id = $1)
            RETURNING id, original, medium, small, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }
}
