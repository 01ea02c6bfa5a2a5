/// Error handling for the API server
///
/// Every handler returns `Result<T, ApiError>`. Errors render as
///
/// ```json
/// {"error_type": "INVALID_OPERATOR", "error_message": "Cant create the task", "field": "title"}
/// ```
///
/// with `error_message` and `field` left out when absent.
///
/// | error_type | status |
/// |------------|--------|
/// | `UNAUTHORIZED` | 401 |
/// | `FORBIDDEN` | 403 |
/// | `NOT_FOUND` | 404 |
/// | `DUPLICATE_VALUE` | 409 |
/// | `DUPLICATE_TASK` | 409 |
/// | `INVALID_OPERATOR` | 400 |
/// | `UNKNOWN_ERROR` | 500 |
///
/// # Example
///
/// ```
/// use dayplan_api::error::{ApiError, ApiResult};
///
/// fn require_title(title: &str) -> ApiResult<()> {
///     if title.is_empty() {
///         return Err(ApiError::invalid("Cant create the task", "title"));
///     }
///     Ok(())
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dayplan_shared::auth::{
    authorization::AuthzError, middleware::AuthError, password::PasswordError,
};
use dayplan_shared::media::{MediaError, RenditionError};
use dayplan_shared::models::task::FilterError;
use dayplan_shared::models::user::EMAIL_UNIQUE_INDEX;
use serde::{Deserialize, Serialize};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Client-facing message for failures whose detail is only logged
const GENERIC_ERROR_MESSAGE: &str = "An internal error occurred";

/// Unified API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or rejected credentials (401)
    #[error("Unauthorized: {}", .0.as_deref().unwrap_or("-"))]
    Unauthorized(Option<String>),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {}", .0.as_deref().unwrap_or("-"))]
    Forbidden(Option<String>),

    /// Resource missing or soft-deleted (404)
    #[error("Not found: {}", .0.as_deref().unwrap_or("-"))]
    NotFound(Option<String>),

    /// Unique value already taken (409)
    #[error("Duplicate value for {field}: {message}")]
    DuplicateValue { field: String, message: String },

    /// Same task already scheduled (409)
    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    /// Invalid input (400)
    #[error("Invalid operator: {message}")]
    InvalidOperator {
        message: String,
        field: Option<String>,
    },

    /// Failure with a message meant for the client (500)
    #[error("Unknown error: {0}")]
    UnknownError(String),

    /// Failure whose detail must not reach the client (500, logged)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    Unauthorized,
    Forbidden,
    NotFound,
    DuplicateValue,
    DuplicateTask,
    InvalidOperator,
    UnknownError,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_type: ErrorType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    /// `InvalidOperator` tied to a request field
    pub fn invalid(message: impl Into<String>, field: impl Into<String>) -> Self {
        ApiError::InvalidOperator {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(Some(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateValue { .. } | ApiError::DuplicateTask(_) => StatusCode::CONFLICT,
            ApiError::InvalidOperator { .. } => StatusCode::BAD_REQUEST,
            ApiError::UnknownError(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            ApiError::Unauthorized(_) => ErrorType::Unauthorized,
            ApiError::Forbidden(_) => ErrorType::Forbidden,
            ApiError::NotFound(_) => ErrorType::NotFound,
            ApiError::DuplicateValue { .. } => ErrorType::DuplicateValue,
            ApiError::DuplicateTask(_) => ErrorType::DuplicateTask,
            ApiError::InvalidOperator { .. } => ErrorType::InvalidOperator,
            ApiError::UnknownError(_) | ApiError::Internal(_) => ErrorType::UnknownError,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_type = self.error_type();

        let (error_message, field) = match self {
            ApiError::Unauthorized(msg) | ApiError::Forbidden(msg) | ApiError::NotFound(msg) => {
                (msg, None)
            }
            ApiError::DuplicateValue { field, message } => (Some(message), Some(field)),
            ApiError::DuplicateTask(msg) | ApiError::UnknownError(msg) => (Some(msg), None),
            ApiError::InvalidOperator { message, field } => (Some(message), field),
            ApiError::Internal(detail) => {
                // Log internal errors but don't expose details to clients
                tracing::error!(error = %detail, "Internal error");
                (Some(GENERIC_ERROR_MESSAGE.to_string()), None)
            }
        };

        let body = Json(ErrorResponse {
            error_type,
            error_message,
            field,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return ApiError::NotFound(None);
        }

        let constraint = err.as_database_error().and_then(|e| e.constraint());
        if constraint == Some(EMAIL_UNIQUE_INDEX) {
            return ApiError::DuplicateValue {
                field: "email".to_string(),
                message: "A user with this email address already exists".to_string(),
            };
        }

        ApiError::Internal(format!("Database error: {}", err))
    }
}

/// Convert authentication errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials | AuthError::InvalidApiKey => {
                ApiError::Unauthorized(Some(err.to_string()))
            }
            AuthError::InactiveAccount => ApiError::Forbidden(Some(err.to_string())),
            AuthError::DatabaseError(e) => ApiError::Internal(format!("Credential lookup failed: {}", e)),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthorized(msg) => ApiError::Unauthorized(Some(msg)),
            AuthzError::Forbidden => ApiError::Forbidden(Some(err.to_string())),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(format!("Password operation failed: {}", err))
    }
}

/// Undecodable uploads are the client's fault; storage failures are ours
impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Rendition(RenditionError::Decode(_)) => {
                ApiError::invalid("Upload a valid image", "original")
            }
            other => ApiError::Internal(format!("Media error: {}", other)),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::InvalidOperator {
            message: err.to_string(),
            field: Some(err.field),
        }
    }
}

/// Reports the first failing field, in field-name order
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                ApiError::invalid(message, field.to_string())
            }
            None => ApiError::InvalidOperator {
                message: "Invalid input".to_string(),
                field: None,
            },
        }
    }
}
