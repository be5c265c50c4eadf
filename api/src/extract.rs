//! Custom extractors that convert axum rejections to structured AppError responses.
//!
//! `AppJson<T>` and `AppPath<T>` replace `axum::Json<T>` and `axum::extract::Path<T>`
//! in handler signatures so that malformed bodies and ids come back as the
//! JSON failure envelope with a 400, not axum's plain-text rejection.

use assessa_core::error::FieldError;
use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON extractor that converts deserialization errors to `AppError::Validation`.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

/// Path extractor; a non-numeric id becomes a 400 instead of axum's default.
pub struct AppPath<T>(pub T);

impl<S, T> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(AppPath(value)),
            Err(rejection) => Err(map_path_rejection(rejection)),
        }
    }
}

/// Convert a `JsonRejection` to a structured `AppError::Validation`.
pub fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let body_text = rejection.body_text();

    // "missing field `name`" → field = "name"
    let field = extract_field_from_serde_message(&body_text).unwrap_or_else(|| "body".to_string());

    AppError::Validation {
        message: "Invalid request body".to_string(),
        errors: vec![FieldError::new(field, body_text)],
    }
}

fn map_path_rejection(rejection: PathRejection) -> AppError {
    AppError::Validation {
        message: "Invalid path parameter".to_string(),
        errors: vec![FieldError::new("id", rejection.body_text())],
    }
}

/// Try to extract a field name from serde's error messages.
fn extract_field_from_serde_message(msg: &str) -> Option<String> {
    ["missing field `", "unknown field `"].iter().find_map(|pattern| {
        let start = msg.find(pattern)? + pattern.len();
        let rest = &msg[start..];
        rest.find('`').map(|end| rest[..end].to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_missing_field_name() {
        let msg = "Failed to deserialize: missing field `initial_prompt` at line 1 column 40";
        assert_eq!(
            extract_field_from_serde_message(msg),
            Some("initial_prompt".to_string())
        );
    }

    #[test]
    fn extracts_unknown_field_name() {
        let msg = "unknown field `category`, expected one of `name`, `description`";
        assert_eq!(
            extract_field_from_serde_message(msg),
            Some("category".to_string())
        );
    }

    #[test]
    fn returns_none_for_generic_error() {
        let msg = "invalid type: string, expected a boolean";
        assert_eq!(extract_field_from_serde_message(msg), None);
    }
}
