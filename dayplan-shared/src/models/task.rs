/// Task model, filters and database operations
///
/// A task is a calendar entry owned by one profile. Clients send the day and
/// time as free-form strings (`select_date`, `select_time`); the server keeps
/// them verbatim and stores the parsed day in `task_date` for filtering.
/// Tasks are never removed through the API, only flagged `is_deleted`.
///
/// # Listing
///
/// Every listing is built from a [`TaskQuery`]. Owner, day and the
/// soft-delete flag are fixed fields of the query, and client-supplied
/// [`TaskFilter`]s are ANDed onto them, so no combination of query
/// parameters can widen a listing beyond one owner's live tasks for one day.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     profile_id UUID NOT NULL REFERENCES user_profiles(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL DEFAULT '',
///     description VARCHAR(255) NOT NULL DEFAULT '',
///     select_date VARCHAR(255) NOT NULL DEFAULT '',
///     select_time VARCHAR(255) NOT NULL DEFAULT '',
///     task_date DATE NOT NULL DEFAULT CURRENT_DATE,
///     all_day BOOLEAN NOT NULL DEFAULT FALSE,
///     repeat BOOLEAN NOT NULL DEFAULT FALSE,
///     notification BOOLEAN NOT NULL DEFAULT FALSE,
///     location VARCHAR(255) NOT NULL DEFAULT '',
///     is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use chrono::NaiveDate;
/// use dayplan_shared::models::task::{CreateTask, Task, TaskFilter, TaskQuery};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, profile_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let day = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
///
/// Task::create(&pool, CreateTask {
///     profile_id,
///     title: "Standup".to_string(),
///     select_date: "2024-01-10".to_string(),
///     select_time: "09:00".to_string(),
///     task_date: day,
///     ..Default::default()
/// })
/// .await?;
///
/// let mut query = TaskQuery::new(profile_id, day);
/// query.filters.extend(TaskFilter::parse("title__istartswith", "stand")?);
///
/// let tasks = Task::list(&pool, &query, 20, 0).await?;
/// assert_eq!(tasks.len(), 1);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::authorization::Owned;

const TASK_COLUMNS: &str = "id, profile_id, title, description, select_date, select_time, \
     task_date, all_day, repeat, notification, location, is_deleted, created_at, updated_at";

/// Task row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,

    /// Owning profile; fixed at creation
    pub profile_id: Uuid,

    pub title: String,
    pub description: String,

    /// Day as the client sent it
    pub select_date: String,

    /// Time of day as the client sent it
    pub select_time: String,

    /// Parsed `select_date`
    pub task_date: NaiveDate,

    pub all_day: bool,
    pub repeat: bool,
    pub notification: bool,
    pub location: String,

    /// Soft-delete flag
    pub is_deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Task {
    fn owner_profile_id(&self) -> Uuid {
        self.profile_id
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Default)]
pub struct CreateTask {
    pub profile_id: Uuid,
    pub title: String,
    pub description: String,
    pub select_date: String,
    pub select_time: String,
    pub task_date: NaiveDate,
    pub all_day: bool,
    pub repeat: bool,
    pub notification: bool,
    pub location: String,
}

/// Partial update; `None` leaves a column unchanged
///
/// The owner is deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub select_date: Option<String>,
    pub select_time: Option<String>,

    /// Set together with `select_date`
    pub task_date: Option<NaiveDate>,

    pub all_day: Option<bool>,
    pub repeat: Option<bool>,
    pub notification: Option<bool>,
    pub location: Option<String>,
}

/// How a `title` filter compares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleMatch {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
}

impl TitleMatch {
    fn from_lookup(lookup: &str) -> Option<Self> {
        Some(match lookup {
            "exact" => TitleMatch::Exact,
            "iexact" => TitleMatch::IExact,
            "contains" => TitleMatch::Contains,
            "icontains" => TitleMatch::IContains,
            "startswith" => TitleMatch::StartsWith,
            "istartswith" => TitleMatch::IStartsWith,
            "endswith" => TitleMatch::EndsWith,
            "iendswith" => TitleMatch::IEndsWith,
            _ => return None,
        })
    }
}

/// A client-supplied condition on the task list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFilter {
    Title(TitleMatch, String),
    TitleIn(Vec<String>),
    Id(Uuid),
    IdIn(Vec<Uuid>),
}

/// A filter parameter that is recognised but has an unusable value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for filter '{field}'")]
pub struct FilterError {
    /// Query parameter name
    pub field: String,
}

impl TaskFilter {
    /// Parses one query parameter
    ///
    /// Returns `Ok(None)` for parameters that are not task filters, which
    /// callers ignore.
    ///
    /// # Errors
    ///
    /// [`FilterError`] when an `id` filter value is not a UUID.
    pub fn parse(key: &str, value: &str) -> Result<Option<Self>, FilterError> {
        let (field, lookup) = key.split_once("__").unwrap_or((key, "exact"));
        let invalid = || FilterError {
            field: key.to_string(),
        };

        let filter = match (field, lookup) {
            ("title", "in") => TaskFilter::TitleIn(split_list(value).map(String::from).collect()),
            ("title", lookup) => match TitleMatch::from_lookup(lookup) {
                Some(kind) => TaskFilter::Title(kind, value.to_string()),
                None => return Ok(None),
            },
            ("id", "exact") => TaskFilter::Id(value.trim().parse().map_err(|_| invalid())?),
            ("id", "in") => TaskFilter::IdIn(
                split_list(value)
                    .map(|v| v.parse::<Uuid>())
                    .collect::<Result<_, _>>()
                    .map_err(|_| invalid())?,
            ),
            _ => return Ok(None),
        };

        Ok(Some(filter))
    }

    fn push_condition(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            TaskFilter::Title(kind, value) => {
                let (column, op, pattern) = match kind {
                    TitleMatch::Exact => ("title", " = ", value.clone()),
                    TitleMatch::IExact => ("lower(title)", " = lower(", value.clone()),
                    TitleMatch::Contains => ("title", " LIKE ", format!("%{}%", escape_like(value))),
                    TitleMatch::IContains => ("title", " ILIKE ", format!("%{}%", escape_like(value))),
                    TitleMatch::StartsWith => ("title", " LIKE ", format!("{}%", escape_like(value))),
                    TitleMatch::IStartsWith => ("title", " ILIKE ", format!("{}%", escape_like(value))),
                    TitleMatch::EndsWith => ("title", " LIKE ", format!("%{}", escape_like(value))),
                    TitleMatch::IEndsWith => ("title", " ILIKE ", format!("%{}", escape_like(value))),
                };
                qb.push(" AND ").push(column).push(op).push_bind(pattern);
                if *kind == TitleMatch::IExact {
                    qb.push(")");
                }
            }
            TaskFilter::TitleIn(values) => {
                qb.push(" AND title = ANY(").push_bind(values.clone()).push(")");
            }
            TaskFilter::Id(id) => {
                qb.push(" AND id = ").push_bind(*id);
            }
            TaskFilter::IdIn(ids) => {
                qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
            }
        }
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|v| !v.is_empty())
}

/// Escapes `LIKE` wildcards so user input matches literally
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A task listing: one owner, one day, live tasks only, plus client filters
#[derive(Debug, Clone)]
pub struct TaskQuery {
    pub profile_id: Uuid,
    pub date: NaiveDate,

    /// Case-insensitive substring search on the title
    pub search: Option<String>,

    pub filters: Vec<TaskFilter>,
}

impl TaskQuery {
    pub fn new(profile_id: Uuid, date: NaiveDate) -> Self {
        Self {
            profile_id,
            date,
            search: None,
            filters: Vec::new(),
        }
    }

    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE profile_id = ")
            .push_bind(self.profile_id)
            .push(" AND is_deleted = FALSE AND task_date = ")
            .push_bind(self.date);

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND title ILIKE ")
                .push_bind(format!("%{}%", escape_like(search)));
        }

        for filter in &self.filters {
            filter.push_condition(qb);
        }
    }
}

impl Task {
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (profile_id, title, description, select_date, select_time,
                               task_date, all_day, repeat, notification, location)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(data.profile_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.select_date)
        .bind(data.select_time)
        .bind(data.task_date)
        .bind(data.all_day)
        .bind(data.repeat)
        .bind(data.notification)
        .bind(data.location)
        .fetch_one(pool)
        .await
    }

    /// Finds a task that has not been soft-deleted
    pub async fn find_live(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND is_deleted = FALSE"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a task including soft-deleted ones
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Applies a partial update to a live task
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                select_date = COALESCE($4, select_date),
                select_time = COALESCE($5, select_time),
                task_date = COALESCE($6, task_date),
                all_day = COALESCE($7, all_day),
                repeat = COALESCE($8, repeat),
                notification = COALESCE($9, notification),
                location = COALESCE($10, location),
                updated_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.select_date)
        .bind(data.select_time)
        .bind(data.task_date)
        .bind(data.all_day)
        .bind(data.repeat)
        .bind(data.notification)
        .bind(data.location)
        .fetch_optional(pool)
        .await
    }

    /// Flags a task as deleted; returns false when it was already gone
    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Runs a listing, ordered by title then id
    pub async fn list(
        pool: &PgPool,
        query: &TaskQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        query.push_where(&mut qb);
        qb.push(" ORDER BY title, id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        qb.build_query_as::<Task>().fetch_all(pool).await
    }

    /// Number of rows the listing matches without paging
    pub async fn count(pool: &PgPool, query: &TaskQuery) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        query.push_where(&mut qb);

        let (count,): (i64,) = qb.build_query_as().fetch_one(pool).await?;
        Ok(count)
    }

    /// Whether the owner already has a live task with this title (any case),
    /// day and time
    pub async fn exists_duplicate(
        pool: &PgPool,
        profile_id: Uuid,
        title: &str,
        task_date: NaiveDate,
        select_time: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM tasks
                WHERE profile_id = $1
                  AND lower(title) = lower($2)
                  AND task_date = $3
                  AND select_time = $4
                  AND is_deleted = FALSE
            )
            "#,
        )
        .bind(profile_id)
        .bind(title)
        .bind(task_date)
        .bind(select_time)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_for(query: &TaskQuery) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM tasks");
        query.push_where(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn test_parse_title_lookups() {
        assert_eq!(
            TaskFilter::parse("title", "Standup").unwrap(),
            Some(TaskFilter::Title(TitleMatch::Exact, "Standup".to_string()))
        );
        assert_eq!(
            TaskFilter::parse("title__icontains", "up").unwrap(),
            Some(TaskFilter::Title(TitleMatch::IContains, "up".to_string()))
        );
        assert_eq!(
            TaskFilter::parse("title__iendswith", "UP").unwrap(),
            Some(TaskFilter::Title(TitleMatch::IEndsWith, "UP".to_string()))
        );
        assert_eq!(
            TaskFilter::parse("title__in", "a, b,,c").unwrap(),
            Some(TaskFilter::TitleIn(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string()
            ]))
        );
    }

    #[test]
    fn test_parse_id_lookups() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(
            TaskFilter::parse("id", &id.to_string()).unwrap(),
            Some(TaskFilter::Id(id))
        );
        assert_eq!(
            TaskFilter::parse("id__exact", &id.to_string()).unwrap(),
            Some(TaskFilter::Id(id))
        );
        assert_eq!(
            TaskFilter::parse("id__in", &format!("{},{}", id, other)).unwrap(),
            Some(TaskFilter::IdIn(vec![id, other]))
        );
    }

    #[test]
    fn test_parse_rejects_bad_ids() {
        assert_eq!(
            TaskFilter::parse("id", "42"),
            Err(FilterError {
                field: "id".to_string()
            })
        );
        assert!(TaskFilter::parse("id__in", "not-a-uuid").is_err());
    }

    #[test]
    fn test_parse_ignores_unknown_parameters() {
        for key in [
            "user",
            "owner",
            "profile_id",
            "is_deleted",
            "title__regex",
            "id__gt",
            "description__contains",
            "limit",
        ] {
            assert_eq!(TaskFilter::parse(key, "x").unwrap(), None, "{key}");
        }
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_where_clause_always_scopes_owner_day_and_live_rows() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let mut query = TaskQuery::new(Uuid::new_v4(), day);
        query.search = Some("stand".to_string());
        query.filters = vec![
            TaskFilter::Title(TitleMatch::IExact, "Standup".to_string()),
            TaskFilter::IdIn(vec![Uuid::new_v4()]),
        ];

        let sql = sql_for(&query);

        assert!(sql.starts_with(
            "SELECT id FROM tasks WHERE profile_id = $1 AND is_deleted = FALSE AND task_date = $2"
        ));
        assert!(sql.contains("AND title ILIKE $3"));
        assert!(sql.contains("AND lower(title) = lower($4)"));
        assert!(sql.contains("AND id = ANY($5)"));
    }

    #[test]
    fn test_empty_search_is_ignored() {
        let mut query = TaskQuery::new(Uuid::new_v4(), NaiveDate::default());
        query.search = Some(String::new());

        assert!(!sql_for(&query).contains("ILIKE"));
    }

    #[test]
    fn test_task_is_owned_by_profile() {
        let profile_id = Uuid::new_v4();
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            profile_id,
            title: "t".to_string(),
            description: String::new(),
            select_date: "2024-01-10".to_string(),
            select_time: "09:00".to_string(),
            task_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            all_day: false,
            repeat: false,
            notification: false,
            location: String::new(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(task.owner_profile_id(), profile_id);
    }
}
