/// Authentication endpoints
///
/// - Sign-up
/// - Sign-in
/// - Sign-out
///
/// # Endpoints
///
/// - `POST /api/v1/authentication/sign_in` - Sign in, or sign up when the
///   body carries `retype_password`
/// - `POST /api/v1/authentication/sign_up` - Create an account
/// - `GET|POST /api/v1/authentication/sign_out` - End the session
///
/// Sign-in and sign-up answer with the caller's profile, whose nested `user`
/// object also carries the account's `api_key` and `is_new`, and set the
/// `sessionid` cookie.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dayplan_shared::{
    auth::{
        password,
        session::{self, generate_session_token, hash_session_token},
    },
    media::{self, StoredRenditions},
    models::{
        api_key::ApiKey,
        image::Image,
        profile::UserProfile,
        session::Session,
        user::{CreateUser, User},
    },
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::profiles::{self, ProfileResponse, ProfileUser};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::FormPayload,
};

pub const EMAIL_NOT_REGISTERED: &str = "Your email address is not registered. Please register";
pub const WRONG_PASSWORD: &str = "Your password is not correct";

/// Sign-up request
#[derive(Debug, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[validate(length(max = 150, message = "First name must be at most 150 characters"))]
    pub first_name: String,

    #[validate(length(max = 150, message = "Last name must be at most 150 characters"))]
    pub last_name: String,
}

impl SignUpRequest {
    fn from_payload(payload: &FormPayload) -> Self {
        Self {
            email: payload.trimmed("email").unwrap_or_default(),
            password: payload.text("password").unwrap_or_default(),
            first_name: payload.trimmed("first_name").unwrap_or_default(),
            last_name: payload.trimmed("last_name").unwrap_or_default(),
        }
    }
}

/// Nested `user` object of a sign-in response
#[derive(Debug, Serialize)]
pub struct SignedInUser {
    #[serde(flatten)]
    pub user: ProfileUser,

    pub api_key: String,

    /// True only on the response that created the account
    pub is_new: bool,
}

pub type SignInResponse = ProfileResponse<SignedInUser>;

/// Sign in, or sign up
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/authentication/sign_in
/// Content-Type: application/json
///
/// {"email": "user@example.com", "password": "secret"}
/// ```
///
/// A body with a non-null `retype_password` is handled as a sign-up.
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email, wrong password, or neither email
///   and password nor a sign-up body
/// - `403 Forbidden`: Account deactivated
pub async fn sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: FormPayload,
) -> ApiResult<Response> {
    if payload.text("retype_password").is_some() {
        return sign_up_with(&state, payload).await;
    }

    if payload.text("email").is_none() || payload.text("password").is_none() {
        return Err(ApiError::unauthorized("Provide an email address and password"));
    }

    let email = payload.trimmed("email").unwrap_or_default();
    let supplied = payload.text("password").unwrap_or_default();

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::unauthorized(EMAIL_NOT_REGISTERED))?;

    if !password::verify_password_blocking(supplied, user.password_hash.clone()).await? {
        tracing::info!(user_id = %user.id, "Sign-in with wrong password");
        return Err(ApiError::unauthorized(WRONG_PASSWORD));
    }

    if !user.is_active {
        return Err(ApiError::Forbidden(Some("Account is inactive".to_string())));
    }

    // Rotate: a presented session never survives a sign-in
    if let Some(token) = session::token_from_headers(&headers) {
        Session::delete_by_token_hash(&state.db, &hash_session_token(&token)).await?;
    }

    let profile = UserProfile::get_or_create(&state.db, user.id).await?;
    let api_key = ApiKey::get_or_issue(&state.db, user.id).await?;
    let (token, token_hash) = generate_session_token();
    Session::create(&state.db, user.id, &token_hash, session_ttl(&state)).await?;
    User::update_last_login(&state.db, user.id).await?;

    tracing::info!(user_id = %user.id, profile_id = %profile.id, "User signed in");

    respond(&state, StatusCode::OK, profile.id, api_key.key, false, &token).await
}

/// Create an account
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/authentication/sign_up
/// Content-Type: multipart/form-data
///
/// email, password, first_name, last_name, [retype_password], [original=<file>]
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Invalid email, empty password, mismatched
///   `retype_password`, or an unreadable image
/// - `409 Conflict`: Email already registered
pub async fn sign_up(State(state): State<AppState>, payload: FormPayload) -> ApiResult<Response> {
    sign_up_with(&state, payload).await
}

async fn sign_up_with(state: &AppState, mut payload: FormPayload) -> ApiResult<Response> {
    let req = SignUpRequest::from_payload(&payload);
    req.validate()?;

    if let Some(retyped) = payload.text("retype_password") {
        if retyped != req.password {
            return Err(ApiError::invalid("Passwords do not match", "retype_password"));
        }
    }

    if User::email_taken(&state.db, &req.email, None).await? {
        return Err(duplicate_email());
    }

    let password_hash = password::hash_password_blocking(req.password.clone()).await?;

    let stored = match payload.take_file("original") {
        Some(file) => Some(media::store_upload(state.media.as_ref(), file.bytes).await?),
        None => None,
    };

    let account = match create_account(state, &req, password_hash, stored.as_ref()).await {
        Ok(account) => account,
        Err(e) => {
            if let Some(stored) = &stored {
                media::remove_files(state.media.as_ref(), &stored.paths()).await;
            }
            return Err(e);
        }
    };

    tracing::info!(
        user_id = %account.user_id,
        profile_id = %account.profile_id,
        "User signed up"
    );

    respond(
        state,
        StatusCode::CREATED,
        account.profile_id,
        account.api_key,
        true,
        &account.session_token,
    )
    .await
}

struct NewAccount {
    user_id: Uuid,
    profile_id: Uuid,
    api_key: String,
    session_token: String,
}

/// Writes user, profile, avatar, API key and session in one transaction
async fn create_account(
    state: &AppState,
    req: &SignUpRequest,
    password_hash: String,
    stored: Option<&StoredRenditions>,
) -> ApiResult<NewAccount> {
    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            email: req.email.clone(),
            password_hash,
            first_name: req.first_name.clone(),
            last_name: req.last_name.clone(),
        },
    )
    .await?;

    let profile = UserProfile::get_or_create(&mut *tx, user.id).await?;

    if let Some(stored) = stored {
        let image = Image::create(&mut *tx, stored).await?;
        UserProfile::set_image(&mut *tx, profile.id, image.id).await?;
    }

    let api_key = ApiKey::get_or_issue(&mut *tx, user.id).await?;

    let (session_token, token_hash) = generate_session_token();
    Session::create(&mut *tx, user.id, &token_hash, session_ttl(state)).await?;

    tx.commit().await?;

    Ok(NewAccount {
        user_id: user.id,
        profile_id: profile.id,
        api_key: api_key.key,
        session_token,
    })
}

/// End the session
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/authentication/sign_out
/// Cookie: sessionid=<token>
/// ```
///
/// `{"success": true}` and a cleared cookie when a live session was ended,
/// otherwise `401` with `{"success": false}`.
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let Some(token) = session::token_from_headers(&headers) else {
        return Ok((StatusCode::UNAUTHORIZED, Json(json!({ "success": false }))).into_response());
    };

    let token_hash = hash_session_token(&token);
    let active = Session::find_active_account(&state.db, &token_hash).await?;
    Session::delete_by_token_hash(&state.db, &token_hash).await?;

    match active {
        Some(row) => {
            tracing::info!(user_id = %row.account.user_id, "User signed out");
            Ok((
                StatusCode::OK,
                [(header::SET_COOKIE, session::clear_session_cookie())],
                Json(json!({ "success": true })),
            )
                .into_response())
        }
        None => Ok((StatusCode::UNAUTHORIZED, Json(json!({ "success": false }))).into_response()),
    }
}

fn session_ttl(state: &AppState) -> chrono::Duration {
    chrono::Duration::hours(state.config.session.ttl_hours as i64)
}

fn duplicate_email() -> ApiError {
    ApiError::DuplicateValue {
        field: "email".to_string(),
        message: "A user with this email address already exists".to_string(),
    }
}

/// Composes the sign-in body and sets the session cookie
async fn respond(
    state: &AppState,
    status: StatusCode,
    profile_id: Uuid,
    api_key: String,
    is_new: bool,
    session_token: &str,
) -> ApiResult<Response> {
    let body: SignInResponse = profiles::hydrate(state, profile_id)
        .await?
        .map_user(|user| SignedInUser {
            user,
            api_key,
            is_new,
        });

    let cookie = session::session_cookie(
        session_token,
        state.config.session.ttl(),
        state.config.session.cookie_secure,
    );

    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dayplan_shared::media::LocalMediaStorage;
    use dayplan_shared::models::profile::ProfileView;
    use serde_json::Value;

    #[test]
    fn test_sign_up_request_trims_and_validates() {
        let payload = FormPayload {
            fields: match json!({
                "email": " ada@example.com ",
                "password": "pw",
                "first_name": "  Ada ",
                "last_name": "Lovelace"
            }) {
                Value::Object(fields) => fields,
                _ => unreachable!(),
            },
            files: Vec::new(),
        };

        let req = SignUpRequest::from_payload(&payload);

        assert_eq!(req.email, "ada@example.com");
        assert_eq!(req.first_name, "Ada");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_sign_up_request_rejects_bad_input() {
        let req = SignUpRequest {
            email: "nope".to_string(),
            password: "pw".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        };
        let err = ApiError::from(req.validate().unwrap_err());
        assert!(matches!(err, ApiError::InvalidOperator { field: Some(ref f), .. } if f == "email"));

        let req = SignUpRequest {
            email: "ada@example.com".to_string(),
            password: String::new(),
            first_name: String::new(),
            last_name: String::new(),
        };
        let err = ApiError::from(req.validate().unwrap_err());
        assert!(matches!(err, ApiError::InvalidOperator { field: Some(ref f), .. } if f == "password"));
    }

    #[test]
    fn test_signed_in_user_flattens_profile_user() {
        let storage = LocalMediaStorage::new("./media", "/media/");
        let view = ProfileView {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            image_id: None,
            image_original: None,
            image_medium: None,
            image_small: None,
        };
        let user_id = view.user_id;

        let body: SignInResponse = ProfileResponse::from_view(view, &storage).map_user(|user| {
            SignedInUser {
                user,
                api_key: "k".repeat(40),
                is_new: true,
            }
        });
        let json = serde_json::to_value(body).unwrap();

        assert_eq!(json["user"]["id"], user_id.to_string());
        assert_eq!(json["user"]["email"], "ada@example.com");
        assert_eq!(json["user"]["api_key"], "k".repeat(40));
        assert_eq!(json["user"]["is_new"], true);
        assert!(json.get("api_key").is_none());
    }
}
