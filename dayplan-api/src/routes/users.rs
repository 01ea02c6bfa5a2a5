/// Public user summaries
///
/// # Endpoints
///
/// - `GET /api/v1/auth/users` - Paginated user list
/// - `GET /api/v1/auth/users/:id` - One user
///
/// Only the display fields are exposed; email, password hash and flags
/// stay private.

use axum::{
    extract::{OriginalUri, Path, RawQuery, State},
    Json,
};
use dayplan_shared::models::user::User;
use serde::Serialize;
use uuid::Uuid;

use super::{parse_id, query_pairs, resource_uri};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    pagination::{ListResponse, Page},
};

/// User summary
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub resource_uri: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            resource_uri: resource_uri("auth/users", user.id),
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<ListResponse<UserResponse>>> {
    let params = query_pairs(query.as_deref())?;
    let page = Page::from_params(&params)?;

    let users = User::list(&state.db, page.limit, page.offset).await?;
    let total = User::count(&state.db).await?;

    let objects = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(ListResponse::new(uri.path(), &params, page, total, objects)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_id(&id)?;

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound(None))?;

    Ok(Json(user.into()))
}
