// HTTP API error types
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::auth::AuthError;
use crate::filter::FilterError;
use crate::store::StoreError;

/// Field name to every reason that field was rejected.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug, Error)]
pub enum ApiError {
    // 400 Bad Request
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),
    #[error("{0}")]
    BadRequest(String),

    // 401 Unauthorized
    #[error("{0}")]
    Unauthorized(String),

    // 403 Forbidden
    #[error("{0}")]
    Forbidden(String),

    // 404 Not Found
    #[error("{0}")]
    NotFound(String),

    // 409 Conflict
    #[error("{0}")]
    Conflict(String),

    // 500 Internal Server Error
    #[error("{0}")]
    Internal(String),

    // 503 Service Unavailable
    #[error("{0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Response body. Validation errors are the field map itself; everything
    /// else is a `detail` message. Internal causes never reach the client.
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::Validation(fields) => json!(fields),
            ApiError::Internal(_) => json!({ "detail": "A server error occurred." }),
            other => json!({ "detail": other.to_string() }),
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_authenticated() -> Self {
        ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn permission_denied() -> Self {
        ApiError::Forbidden("You do not have permission to perform this action.".to_string())
    }

    pub fn not_found() -> Self {
        ApiError::NotFound("Not found.".to_string())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::not_found(),
            StoreError::UniqueViolation { field, message } => ApiError::field(field, message),
            StoreError::InvalidReference { field, message } => ApiError::field(field, message),
            StoreError::Protected(message) => ApiError::conflict(message),
            StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal(sqlx_err.to_string())
            }
            StoreError::Migrate(migrate_err) => {
                tracing::error!("Migration error: {}", migrate_err);
                ApiError::ServiceUnavailable("Service is being updated, please try again later".to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Store(store_err) => store_err.into(),
            AuthError::Hash(hash_err) => {
                tracing::error!("Password hashing error: {}", hash_err);
                ApiError::internal(hash_err.to_string())
            }
            AuthError::Encoding(msg) => {
                tracing::error!("Token encoding error: {}", msg);
                ApiError::internal(msg)
            }
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::InvalidValue { param, message } => ApiError::field(param, message),
            FilterError::InvalidPage => ApiError::NotFound("Invalid page.".to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.to_json())).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer realm=\"api\""));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_body_is_the_field_map() {
        let mut fields = FieldErrors::new();
        fields.insert("first_name".into(), vec!["This field is required.".into()]);
        fields.insert("last_name".into(), vec!["This field may not be blank.".into()]);
        let err = ApiError::Validation(fields);

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_json(),
            json!({
                "first_name": ["This field is required."],
                "last_name": ["This field may not be blank."]
            })
        );
    }

    #[test]
    fn internal_errors_hide_their_cause() {
        let err = ApiError::internal("connection reset by peer");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_json(), json!({ "detail": "A server error occurred." }));
    }

    #[test]
    fn unauthorized_sets_www_authenticate() {
        let response = ApiError::not_authenticated().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[test]
    fn store_conflicts_map_to_field_errors() {
        let err: ApiError = StoreError::UniqueViolation {
            field: "slug".into(),
            message: "club with this slug already exists.".into(),
        }
        .into();
        assert_eq!(err.to_json(), json!({ "slug": ["club with this slug already exists."] }));
    }
}
