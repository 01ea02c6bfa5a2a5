/// User profile endpoints
///
/// # Endpoints
///
/// - `GET /api/v1/userprofile` - Paginated profile list
/// - `GET /api/v1/userprofile/:id` - Profile detail
/// - `PUT|PATCH /api/v1/userprofile/:id` - Update names or email (owner only)
/// - `DELETE /api/v1/userprofile/:id` - Delete profile and user (owner only)
/// - `POST /api/v1/userprofile/profile-image` - Upload a new avatar
///
/// Profiles are always read back from the database: the nested `user`
/// object reflects the stored user row, never the request body.

use axum::{
    extract::{OriginalUri, Path, RawQuery, State},
    http::StatusCode,
    Extension, Json,
};
use dayplan_shared::{
    auth::{
        authorization::{Authorizer, OwnerOnly},
        middleware::AuthContext,
    },
    media::{self, MediaStorage, StoredRenditions},
    models::{
        image::Image,
        profile::{ProfileView, UserProfile},
        user::{UpdateUser, User},
    },
};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::{parse_id, query_pairs, resource_uri};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::FormPayload,
    pagination::{ListResponse, Page},
};

/// Returned when the avatar rebind touches no profile row
pub const PROFILE_IMAGE_FAILED: &str = "Can't update user profile image";

/// Image with its rendition URLs
#[derive(Debug, Clone, Serialize)]
pub struct ImageResponse {
    pub id: Uuid,
    pub resource_uri: String,
    pub original: String,
    pub medium: String,
    pub small: String,
}

impl ImageResponse {
    pub fn new(id: Uuid, paths: [&str; 3], storage: &dyn MediaStorage) -> Self {
        let [original, medium, small] = paths;
        Self {
            id,
            resource_uri: resource_uri("userimage", id),
            original: storage.url(original),
            medium: storage.url(medium),
            small: storage.url(small),
        }
    }

    pub fn from_image(image: &Image, storage: &dyn MediaStorage) -> Self {
        Self::new(image.id, image.paths(), storage)
    }

    fn from_view(view: &ProfileView, storage: &dyn MediaStorage) -> Option<Self> {
        match (
            view.image_id,
            view.image_original.as_deref(),
            view.image_medium.as_deref(),
            view.image_small.as_deref(),
        ) {
            (Some(id), Some(original), Some(medium), Some(small)) => {
                Some(Self::new(id, [original, medium, small], storage))
            }
            _ => None,
        }
    }
}

/// The `user` object nested in a profile
#[derive(Debug, Clone, Serialize)]
pub struct ProfileUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image: Option<ImageResponse>,
}

/// Profile representation
///
/// `U` is the nested user object; sign-in responses extend it with the
/// caller's credentials.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse<U = ProfileUser> {
    pub id: Uuid,
    pub resource_uri: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image: Option<ImageResponse>,
    pub user: U,
}

impl ProfileResponse {
    pub fn from_view(view: ProfileView, storage: &dyn MediaStorage) -> Self {
        let image = ImageResponse::from_view(&view, storage);

        Self {
            id: view.id,
            resource_uri: resource_uri("userprofile", view.id),
            first_name: view.first_name.clone(),
            last_name: view.last_name.clone(),
            email: view.email.clone(),
            image: image.clone(),
            user: ProfileUser {
                id: view.user_id,
                first_name: view.first_name,
                last_name: view.last_name,
                email: view.email,
                image,
            },
        }
    }
}

impl<U> ProfileResponse<U> {
    /// Replaces the nested user object
    pub fn map_user<V>(self, f: impl FnOnce(U) -> V) -> ProfileResponse<V> {
        ProfileResponse {
            id: self.id,
            resource_uri: self.resource_uri,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            image: self.image,
            user: f(self.user),
        }
    }
}

/// Loads and renders one profile
pub async fn hydrate(state: &AppState, profile_id: Uuid) -> ApiResult<ProfileResponse> {
    let view = UserProfile::find_view(&state.db, profile_id)
        .await?
        .ok_or(ApiError::NotFound(None))?;

    Ok(ProfileResponse::from_view(view, state.media.as_ref()))
}

/// Profile update request
#[derive(Debug, Default, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 150, message = "First name must be at most 150 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 150, message = "Last name must be at most 150 characters"))]
    pub last_name: Option<String>,

    #[validate(email(message = "Enter a valid email address"))]
    pub email: Option<String>,
}

impl UpdateProfileRequest {
    fn from_payload(payload: &FormPayload) -> Self {
        Self {
            first_name: payload.trimmed("first_name"),
            last_name: payload.trimmed("last_name"),
            email: payload.trimmed("email"),
        }
    }
}

/// Profile image upload response
#[derive(Debug, Serialize)]
pub struct ProfileImageResponse {
    pub success: bool,
    pub resource_uri: String,
    pub original: String,
    pub medium: String,
    pub small: String,
}

/// List profiles
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/userprofile?limit=20&offset=0
/// ```
pub async fn list_profiles(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<ListResponse<ProfileResponse>>> {
    let params = query_pairs(query.as_deref())?;
    let page = Page::from_params(&params)?;

    let views = UserProfile::list_views(&state.db, page.limit, page.offset).await?;
    let total = UserProfile::count(&state.db).await?;

    let objects = views
        .into_iter()
        .map(|view| ProfileResponse::from_view(view, state.media.as_ref()))
        .collect();

    Ok(Json(ListResponse::new(uri.path(), &params, page, total, objects)))
}

/// Get one profile
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProfileResponse>> {
    let id = parse_id(&id)?;
    Ok(Json(hydrate(&state, id).await?))
}

/// Update a profile's names or email
///
/// # Errors
///
/// - `401 Unauthorized`: No credentials
/// - `403 Forbidden`: Caller does not own the profile
/// - `400 Bad Request`: A field failed validation
/// - `409 Conflict`: Email already used by another user
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    payload: FormPayload,
) -> ApiResult<Json<ProfileResponse>> {
    let principal = auth.require_principal()?;
    let id = parse_id(&id)?;

    let view = UserProfile::find_view(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound(None))?;
    OwnerOnly.update_detail(principal, &view)?;

    let req = UpdateProfileRequest::from_payload(&payload);
    req.validate()?;

    if let Some(email) = req.email.as_deref() {
        if User::email_taken(&state.db, email, Some(view.user_id)).await? {
            return Err(ApiError::DuplicateValue {
                field: "email".to_string(),
                message: "A user with this email address already exists".to_string(),
            });
        }
    }

    let update = UpdateUser {
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
    };
    if !update.is_empty() {
        User::update(&state.db, view.user_id, update)
            .await?
            .ok_or(ApiError::NotFound(None))?;
        tracing::info!(profile_id = %id, user_id = %view.user_id, "Profile updated");
    }

    Ok(Json(hydrate(&state, id).await?))
}

/// Delete a profile together with its user
///
/// API key, sessions and tasks go with the user. The avatar is removed
/// when no other profile points at it.
pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let principal = auth.require_principal()?;
    let id = parse_id(&id)?;

    let profile = UserProfile::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound(None))?;
    OwnerOnly.delete_detail(principal, &profile)?;

    let mut tx = state.db.begin().await?;
    UserProfile::delete(&mut *tx, profile.id).await?;
    User::delete(&mut *tx, profile.user_id).await?;
    let orphan = match profile.image_id {
        Some(image_id) => Image::delete_if_unreferenced(&mut *tx, image_id).await?,
        None => None,
    };
    tx.commit().await?;

    if let Some(image) = orphan {
        media::remove_files(state.media.as_ref(), &image.paths()).await;
    }

    tracing::info!(profile_id = %profile.id, user_id = %profile.user_id, "Profile deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Upload a new profile image
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/userprofile/profile-image
/// Content-Type: multipart/form-data
///
/// original=<file>
/// ```
///
/// # Response
///
/// ```json
/// {
///   "success": true,
///   "resource_uri": "/api/v1/userimage/<uuid>",
///   "original": "/media/images/<uuid>/original.png",
///   "medium": "/media/images/<uuid>/medium.png",
///   "small": "/media/images/<uuid>/small.png"
/// }
/// ```
///
/// The previous image record, if any, is left in place.
pub async fn upload_profile_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    mut payload: FormPayload,
) -> ApiResult<Json<ProfileImageResponse>> {
    let principal = auth.require_principal()?;

    let file = payload
        .take_file("original")
        .ok_or_else(|| ApiError::invalid("Upload an image in the 'original' field", "original"))?;
    if let Some(extra) = payload.files.first() {
        return Err(ApiError::InvalidOperator {
            message: "Only one file may be uploaded".to_string(),
            field: Some(extra.field.clone()),
        });
    }

    let stored = media::store_upload(state.media.as_ref(), file.bytes).await?;

    let image = match attach_image(&state.db, principal.profile_id, &stored).await {
        Ok(image) => image,
        Err(e) => {
            media::remove_files(state.media.as_ref(), &stored.paths()).await;
            return Err(e);
        }
    };

    tracing::info!(
        profile_id = %principal.profile_id,
        image_id = %image.id,
        "Profile image updated"
    );

    let urls = ImageResponse::from_image(&image, state.media.as_ref());
    Ok(Json(ProfileImageResponse {
        success: true,
        resource_uri: urls.resource_uri,
        original: urls.original,
        medium: urls.medium,
        small: urls.small,
    }))
}

/// Creates the image row and points the profile at it, atomically
async fn attach_image(
    db: &PgPool,
    profile_id: Uuid,
    stored: &StoredRenditions,
) -> ApiResult<Image> {
    let mut tx = db.begin().await?;

    let image = Image::create(&mut *tx, stored).await?;
    let updated = UserProfile::set_image(&mut *tx, profile_id, image.id).await?;

    if updated == 0 {
        tx.rollback().await?;
        return Err(ApiError::UnknownError(PROFILE_IMAGE_FAILED.to_string()));
    }

    tx.commit().await?;
    Ok(image)
}
