//! Typed errors and HTTP mapping.

use crate::response::{error_body, ApiResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Problems with model definitions or process settings. Surface at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate model name: {0}")]
    DuplicateModel(String),
    #[error("invalid schema for model {model}: {reason}")]
    InvalidSchema { model: String, reason: String },
    #[error("invalid parameter '{name}' on model {model}: {reason}")]
    InvalidParameter {
        model: String,
        name: String,
        reason: String,
    },
    #[error("invalid model name '{0}': use lowercase letters, digits, '_' or '-'")]
    InvalidName(String),
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: String, reason: String },
    #[error("config load: {0}")]
    Load(String),
}

/// Failures reported by a storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Identifier does not have the backend's format.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Uniqueness or foreign-key constraint violated. Carries the backend's reason.
    #[error("{0}")]
    Conflict(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("document store: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("storage: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidId(id) => AppError::InvalidId(id),
            StoreError::Conflict(reason) => AppError::Conflict(reason),
            StoreError::Db(e) => AppError::Internal(e.to_string()),
            StoreError::Mongo(e) => AppError::Internal(e.to_string()),
            StoreError::Backend(reason) => AppError::Internal(reason),
        }
    }
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::InvalidId(_) => (StatusCode::BAD_REQUEST, "invalid_id"),
            AppError::Conflict(_) => (StatusCode::BAD_REQUEST, "conflict"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    /// Normalized response for this error. Internal details are logged, never returned.
    pub fn into_api_response(self) -> ApiResponse {
        let (status, code) = self.status_and_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        ApiResponse::with_status(status, error_body(code, message))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_api_response().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_request_taxonomy() {
        let e: AppError = StoreError::InvalidId("zz".into()).into();
        assert_eq!(e.status_and_code().0, StatusCode::BAD_REQUEST);
        let e: AppError = StoreError::Conflict("duplicate key".into()).into();
        assert_eq!(e.status_and_code(), (StatusCode::BAD_REQUEST, "conflict"));
        let e: AppError = StoreError::Backend("disk gone".into()).into();
        assert_eq!(e.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_errors_hide_detail() {
        let resp = AppError::Internal("connection refused at 10.0.0.3".into()).into_api_response();
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.body["error"]["message"], "internal server error");
    }

    #[test]
    fn conflict_keeps_reason() {
        let resp = AppError::Conflict("duplicate key value violates unique constraint \"urls_url_key\"".into())
            .into_api_response();
        let message = resp.body["error"]["message"].as_str().unwrap_or_default();
        assert!(message.contains("urls_url_key"));
    }
}
