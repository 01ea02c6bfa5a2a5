/// Database models for Dayplan
///
/// Each model is a `sqlx::FromRow` struct with its queries as associated
/// functions. Functions that take part in multi-statement transactions
/// accept any `PgExecutor`, so they run on a pool or a `&mut Transaction`
/// alike.
///
/// # Models
///
/// - `user`: login identities
/// - `api_key`: one API key per user
/// - `session`: cookie sessions
/// - `profile`: per-user profile, owner of tasks and avatar
/// - `image`: stored avatar renditions
/// - `task`: calendar tasks, filters and listing queries
///
/// # Example
///
/// ```no_run
/// use dayplan_shared::models::{api_key::ApiKey, profile::UserProfile, user::{CreateUser, User}};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let mut tx = pool.begin().await?;
///
/// let user = User::create(&mut *tx, CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     first_name: "Grace".to_string(),
///     last_name: "Hopper".to_string(),
/// })
/// .await?;
/// UserProfile::get_or_create(&mut *tx, user.id).await?;
/// ApiKey::get_or_issue(&mut *tx, user.id).await?;
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

pub mod api_key;
pub mod image;
pub mod profile;
pub mod session;
pub mod task;
pub mod user;
