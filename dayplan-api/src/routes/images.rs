/// Image rendition lookup
///
/// `GET /api/v1/userimage/:id` returns the three rendition URLs of an
/// uploaded image.

use axum::{
    extract::{Path, State},
    Json,
};
use dayplan_shared::models::image::Image;

use super::{parse_id, profiles::ImageResponse};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ImageResponse>> {
    let id = parse_id(&id)?;

    let image = Image::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound(None))?;

    Ok(Json(ImageResponse::from_image(&image, state.media.as_ref())))
}
