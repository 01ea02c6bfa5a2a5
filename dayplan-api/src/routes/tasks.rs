/// Task endpoints
///
/// # Endpoints
///
/// - `GET /api/v1/tasks` - The caller's tasks for one day
/// - `POST /api/v1/tasks` - Create a task
/// - `PUT|PATCH|DELETE /api/v1/tasks` - Bulk changes, always rejected
/// - `GET /api/v1/tasks/listing` - Same listing, read-only
/// - `GET /api/v1/tasks/:id` - Task detail (owner only)
/// - `PUT|PATCH /api/v1/tasks/:id` - Partial update (owner only)
/// - `DELETE /api/v1/tasks/:id` - Soft delete (owner only)
///
/// # Listing parameters
///
/// - `date`: day to list (default: today, UTC)
/// - `q`: case-insensitive substring of the title
/// - `title`, `title__exact`, `title__iexact`, `title__contains`,
///   `title__icontains`, `title__startswith`, `title__istartswith`,
///   `title__endswith`, `title__iendswith`, `title__in`, `id`, `id__exact`,
///   `id__in`: narrow the listing further
/// - `limit`, `offset`: paging
///
/// Other parameters are ignored. Listings never leave the caller's own,
/// undeleted tasks for the chosen day.

use axum::{
    extract::{OriginalUri, Path, RawQuery, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use dayplan_shared::{
    auth::{
        authorization::{AuthzError, Authorizer, OwnerOnly},
        middleware::{AuthContext, Principal},
    },
    dates,
    models::task::{CreateTask, Task, TaskFilter, TaskQuery, UpdateTask},
};
use serde::Serialize;
use uuid::Uuid;

use super::{parse_id, query_pairs, resource_uri};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::FormPayload,
    pagination::{ListResponse, Page},
};

/// Message for a create without title, date or time, or one the database refused
pub const CANT_CREATE_TASK: &str = "Cant create the task";

const REQUIRED_FIELDS: [&str; 3] = ["title", "select_date", "select_time"];

/// Task representation
///
/// Owner and the parsed day are internal and not part of the body.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub resource_uri: String,
    pub title: String,
    pub description: String,
    pub select_date: String,
    pub select_time: String,
    pub all_day: bool,
    pub repeat: bool,
    pub notification: bool,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            resource_uri: resource_uri("tasks", task.id),
            title: task.title,
            description: task.description,
            select_date: task.select_date,
            select_time: task.select_time,
            all_day: task.all_day,
            repeat: task.repeat,
            notification: task.notification,
            location: task.location,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Builds the listing for `principal` from query parameters
fn listing_query(principal: &Principal, params: &[(String, String)]) -> ApiResult<TaskQuery> {
    let mut date = None;
    let mut search = None;
    let mut filters = Vec::new();

    for (key, value) in params {
        match key.as_str() {
            "date" => {
                date = Some(
                    dates::parse_date(value)
                        .ok_or_else(|| ApiError::invalid(format!("Invalid date '{}'", value), "date"))?,
                );
            }
            "q" => search = Some(value.trim().to_string()).filter(|s| !s.is_empty()),
            _ => filters.extend(TaskFilter::parse(key, value)?),
        }
    }

    let mut query = TaskQuery::new(principal.profile_id, date.unwrap_or_else(dates::today));
    query.search = search;
    query.filters = filters;
    Ok(query)
}

async fn run_listing(
    state: &AppState,
    auth: &AuthContext,
    path: &str,
    raw_query: Option<&str>,
) -> ApiResult<ListResponse<TaskResponse>> {
    let principal = auth.require_principal()?;
    let params = query_pairs(raw_query)?;
    let page = Page::from_params(&params)?;
    let query = listing_query(principal, &params)?;

    let tasks = Task::list(&state.db, &query, page.limit, page.offset).await?;
    let total = Task::count(&state.db, &query).await?;

    let objects = tasks.into_iter().map(TaskResponse::from).collect();
    Ok(ListResponse::new(path, &params, page, total, objects))
}

/// List the caller's tasks for one day
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/tasks?date=2024-01-10&q=stand
/// ```
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<ListResponse<TaskResponse>>> {
    Ok(Json(run_listing(&state, &auth, uri.path(), query.as_deref()).await?))
}

/// Read-only listing for authenticated callers
pub async fn listing(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<ListResponse<TaskResponse>>> {
    Ok(Json(run_listing(&state, &auth, uri.path(), query.as_deref()).await?))
}

/// Create a task
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/tasks
/// Content-Type: application/json
///
/// {
///   "title": "Standup",
///   "select_date": "2024-01-10",
///   "select_time": "09:00",
///   "all_day": false
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: title, date or time missing, or the date is unreadable
/// - `409 Conflict`: duplicate task, when duplicate rejection is enabled
/// - `500 Internal Server Error`: the database refused the row
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: FormPayload,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let principal = auth.require_principal()?;

    if let Some(missing) = REQUIRED_FIELDS
        .iter()
        .find(|field| payload.trimmed(field).map_or(true, |v| v.is_empty()))
    {
        return Err(ApiError::invalid(CANT_CREATE_TASK, *missing));
    }

    let title = payload.trimmed("title").unwrap_or_default();
    let select_date = payload.trimmed("select_date").unwrap_or_default();
    let select_time = payload.trimmed("select_time").unwrap_or_default();
    let task_date = dates::parse_date(&select_date)
        .ok_or_else(|| ApiError::invalid(format!("Invalid date '{}'", select_date), "select_date"))?;

    if state.config.tasks.reject_duplicates
        && Task::exists_duplicate(&state.db, principal.profile_id, &title, task_date, &select_time)
            .await?
    {
        return Err(ApiError::DuplicateTask(format!(
            "A task named '{}' is already scheduled for {} at {}",
            title, select_date, select_time
        )));
    }

    let data = CreateTask {
        // The owner always comes from the credentials
        profile_id: principal.profile_id,
        title,
        description: payload.text("description").unwrap_or_default(),
        select_date,
        select_time,
        task_date,
        all_day: payload.flag("all_day")?.unwrap_or(false),
        repeat: payload.flag("repeat")?.unwrap_or(false),
        notification: payload.flag("notification")?.unwrap_or(false),
        location: payload.text("location").unwrap_or_default(),
    };

    let task = Task::create(&state.db, data).await.map_err(|e| {
        tracing::error!(error = %e, profile_id = %principal.profile_id, "Task insert failed");
        ApiError::UnknownError(CANT_CREATE_TASK.to_string())
    })?;

    tracing::info!(task_id = %task.id, profile_id = %task.profile_id, "Task created");

    Ok((StatusCode::CREATED, Json(task.into())))
}

/// Loads a task that has not been deleted
async fn live_task(state: &AppState, id: &str) -> ApiResult<Task> {
    let id = parse_id(id)?;

    Task::find_live(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound(None))
}

/// Get one task
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskResponse>> {
    let principal = auth.require_principal()?;
    let task = live_task(&state, &id).await?;

    if !OwnerOnly::owns(principal, &task) {
        return Err(AuthzError::Forbidden.into());
    }

    Ok(Json(task.into()))
}

/// Update a task
///
/// Only the fields present in the body change. A new `select_date` also
/// moves the task to that day.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    payload: FormPayload,
) -> ApiResult<Json<TaskResponse>> {
    let principal = auth.require_principal()?;
    let task = live_task(&state, &id).await?;
    OwnerOnly.update_detail(principal, &task)?;

    let update = update_from_payload(&payload)?;

    let task = Task::update(&state.db, task.id, update)
        .await?
        .ok_or(ApiError::NotFound(None))?;

    tracing::info!(task_id = %task.id, "Task updated");

    Ok(Json(task.into()))
}

fn update_from_payload(payload: &FormPayload) -> ApiResult<UpdateTask> {
    for field in REQUIRED_FIELDS {
        if payload.has(field) && payload.trimmed(field).map_or(true, |v| v.is_empty()) {
            return Err(ApiError::invalid(format!("'{}' may not be blank", field), field));
        }
    }

    let select_date = payload.trimmed("select_date");
    let task_date = match select_date.as_deref() {
        Some(raw) => Some(
            dates::parse_date(raw)
                .ok_or_else(|| ApiError::invalid(format!("Invalid date '{}'", raw), "select_date"))?,
        ),
        None => None,
    };

    Ok(UpdateTask {
        title: payload.trimmed("title"),
        description: payload.text("description"),
        select_date,
        select_time: payload.trimmed("select_time"),
        task_date,
        all_day: payload.flag("all_day")?,
        repeat: payload.flag("repeat")?,
        notification: payload.flag("notification")?,
        location: payload.text("location"),
    })
}

/// Soft-delete a task
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let principal = auth.require_principal()?;
    let task = live_task(&state, &id).await?;
    OwnerOnly.delete_detail(principal, &task)?;

    if !Task::soft_delete(&state.db, task.id).await? {
        return Err(ApiError::NotFound(None));
    }

    tracing::info!(task_id = %task.id, "Task deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// `PUT|PATCH /api/v1/tasks`
pub async fn update_task_list(Extension(auth): Extension<AuthContext>) -> ApiResult<StatusCode> {
    let principal = auth.require_principal()?;
    Authorizer::<Task>::update_list(&OwnerOnly, principal)?;

    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/v1/tasks`
pub async fn delete_task_list(Extension(auth): Extension<AuthContext>) -> ApiResult<StatusCode> {
    let principal = auth.require_principal()?;
    Authorizer::<Task>::delete_list(&OwnerOnly, principal)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dayplan_shared::auth::middleware::AuthMethod;
    use serde_json::{json, Value};

    fn principal() -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            is_superuser: false,
            method: AuthMethod::ApiKey,
            session_id: None,
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn payload(value: Value) -> FormPayload {
        match value {
            Value::Object(fields) => FormPayload {
                fields,
                files: Vec::new(),
            },
            _ => panic!("payload must be an object"),
        }
    }

    #[test]
    fn test_listing_is_pinned_to_the_caller() {
        let principal = principal();
        let query = listing_query(
            &principal,
            &params(&[
                ("date", "2024-01-10"),
                ("q", " stand "),
                ("title__icontains", "up"),
                ("user", "someone-else"),
                ("is_deleted", "true"),
                ("limit", "5"),
            ]),
        )
        .unwrap();

        assert_eq!(query.profile_id, principal.profile_id);
        assert_eq!(query.date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(query.search.as_deref(), Some("stand"));
        assert_eq!(query.filters.len(), 1);
    }

    #[test]
    fn test_listing_defaults_to_today() {
        let query = listing_query(&principal(), &[]).unwrap();

        assert_eq!(query.date, dates::today());
        assert!(query.search.is_none());
    }

    #[test]
    fn test_listing_rejects_bad_values() {
        let err = listing_query(&principal(), &params(&[("date", "someday")])).unwrap_err();
        assert!(matches!(err, ApiError::InvalidOperator { field: Some(ref f), .. } if f == "date"));

        let err = listing_query(&principal(), &params(&[("id__in", "1,2")])).unwrap_err();
        assert!(matches!(err, ApiError::InvalidOperator { .. }));
    }

    #[test]
    fn test_task_body_hides_internal_fields() {
        let task = Task {
            id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            title: "Standup".to_string(),
            description: String::new(),
            select_date: "2024-01-10".to_string(),
            select_time: "09:00".to_string(),
            task_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            all_day: false,
            repeat: false,
            notification: false,
            location: String::new(),
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(TaskResponse::from(task)).unwrap();

        for hidden in ["profile_id", "owner", "user", "task_date", "total_records"] {
            assert!(json.get(hidden).is_none(), "{hidden} leaked");
        }
        assert_eq!(json["title"], "Standup");
    }

    #[test]
    fn test_update_payload() {
        let update = update_from_payload(&payload(json!({
            "select_date": "2024-01-12",
            "notification": "1"
        })))
        .unwrap();

        assert_eq!(update.task_date, NaiveDate::from_ymd_opt(2024, 1, 12));
        assert_eq!(update.notification, Some(true));
        assert!(update.title.is_none());

        let err = update_from_payload(&payload(json!({ "title": "  " }))).unwrap_err();
        assert!(matches!(err, ApiError::InvalidOperator { field: Some(ref f), .. } if f == "title"));
    }

    #[tokio::test]
    async fn test_bulk_changes_are_rejected() {
        let mut auth = AuthContext::anonymous();
        auth.principal = Some(Principal {
            is_superuser: true,
            ..principal()
        });

        let err = update_task_list(Extension(auth.clone())).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(Some(ref m)) if m == "Sorry, no update by bundle."));

        let err = delete_task_list(Extension(auth)).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(Some(ref m)) if m == "Sorry, no deletes by bundle"));
    }
}
