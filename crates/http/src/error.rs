//! Error handling for the bookshelf HTTP layer

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bookshelf_db::{StoreError, StoreErrorKind};
use thiserror::Error;
use uuid::Uuid;

/// Response header carrying the id under which the error was logged.
pub const ERROR_ID_HEADER: &str = "x-error-id";

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<String>,
        message: String,
    },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("{message} ({source})")]
    Store {
        message: String,
        #[source]
        source: StoreError,
    },
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Wrap a store failure with the message shown to the user
    pub fn store(message: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            message: message.into(),
            source,
        }
    }

    /// Stable machine-readable code, used in logs
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::NotFound { .. } => "not_found",
            AppError::BadRequest { .. } => "bad_request",
            AppError::Store { source, .. } => match source.kind() {
                StoreErrorKind::Connectivity => "store_unavailable",
                StoreErrorKind::Timeout => "store_timeout",
                StoreErrorKind::Contention => "store_busy",
                StoreErrorKind::Constraint => "store_constraint",
                StoreErrorKind::Consistency => "store_consistency",
                StoreErrorKind::Coercion => "store_coercion",
                StoreErrorKind::Query => "store_query",
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Store { source, .. } => match source.kind() {
                _ if source.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
                StoreErrorKind::Constraint => StatusCode::CONFLICT,
                StoreErrorKind::Coercion => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let status = self.status();
        let error_code = self.code();

        if status.is_server_error() {
            tracing::error!(
                error_id = %error_id,
                error_code,
                status_code = status.as_u16(),
                error = %self,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_id = %error_id,
                error_code,
                status_code = status.as_u16(),
                error = %self,
                "Request error"
            );
        }

        let body = match self {
            AppError::Validation { details, message } => {
                let mut body = message;
                for detail in details {
                    body.push('\n');
                    body.push_str(&detail);
                }
                body
            }
            AppError::NotFound { message }
            | AppError::BadRequest { message }
            | AppError::Store { message, .. } => message,
        };

        let mut response = (status, body).into_response();
        if let Ok(value) = HeaderValue::from_str(&error_id.to_string()) {
            response.headers_mut().insert(ERROR_ID_HEADER, value);
        }
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::time::Duration;

    #[test]
    fn test_validation_error() {
        let details = vec!["title is required".to_string()];
        let error = AppError::validation(details.clone(), "Validation failed");

        match error {
            AppError::Validation { details: d, message } => {
                assert_eq!(d, details);
                assert_eq!(message, "Validation failed");
            }
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_error_response_mapping() {
        let error = AppError::not_found("Book not found.");
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(ERROR_ID_HEADER));
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_bad_request_mapping() {
        let response = AppError::bad_request("Error adding book.").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key(ERROR_ID_HEADER));
    }

    #[test]
    fn test_store_error_status_follows_kind() {
        let timeout = AppError::store(
            "Error fetching books.",
            StoreError::Timeout {
                operation: "list_books",
                after: Duration::from_millis(5),
            },
        );
        assert_eq!(timeout.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(timeout.code(), "store_timeout");

        let coercion = AppError::store("Error fetching book.", StoreError::coercion("abc"));
        assert_eq!(coercion.status(), StatusCode::BAD_REQUEST);

        let consistency =
            AppError::store("Error fetching book.", StoreError::consistency("two rows"));
        assert_eq!(consistency.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_store_error_body_is_the_user_message() {
        let error = AppError::store("Error adding book.", StoreError::consistency("boom"));
        let response = error.into_response();
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Error adding book.");
    }
}
