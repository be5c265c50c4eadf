use assessa_core::error::{ApiError, FieldError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::ai::AiError;

/// Internal error type that converts to the `{success: false, ...}` envelope
#[derive(Debug)]
pub enum AppError {
    /// Missing, malformed or expired bearer token (401)
    Unauthorized { message: String },
    /// Authenticated but not allowed (403)
    Forbidden { message: String },
    /// Request body or path failed validation (400)
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },
    /// Referenced questionnaire/assessment/session does not exist (404)
    NotFound { resource: String },
    /// Request conflicts with the current state of the resource (409)
    Conflict { message: String },
    /// Database error (500)
    Database(sqlx::Error),
    /// Language model call failed or returned unusable output (500)
    Ai(AiError),
    /// Stored data violates an invariant (500)
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Validation {
            errors: vec![FieldError::new(field, message.clone())],
            message,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Ai(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::Unauthorized { message }
            | AppError::Forbidden { message }
            | AppError::Conflict { message } => {
                tracing::warn!(status = status.as_u16(), "{}", message);
                ApiError::new(message)
            }
            AppError::Validation { message, errors } => {
                tracing::warn!(errors = ?errors, "Validation failed: {}", message);
                ApiError::with_errors(message, errors)
            }
            AppError::NotFound { resource } => {
                tracing::warn!(resource = %resource, "Resource not found");
                ApiError::new(format!("{resource} not found"))
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                ApiError::new(err.to_string())
            }
            AppError::Ai(err) => {
                tracing::error!("Language model error: {}", err);
                ApiError::new(err.to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ApiError::new(msg)
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<AiError> for AppError {
    fn from(err: AiError) -> Self {
        AppError::Ai(err)
    }
}
