use assessa_core::auth::{AuthError, Role};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub role: Role,
    pub username: Option<String>,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub fn require_admin(auth: &AuthenticatedUser, operation: &str) -> Result<(), AppError> {
    if auth.is_admin() {
        return Ok(());
    }

    tracing::warn!(
        user_id = auth.user_id,
        role = auth.role.as_str(),
        operation = operation,
        decision = "deny",
        "admin authorization decision"
    );
    Err(AppError::Forbidden {
        message: format!("Admin privileges required for '{operation}'"),
    })
}

/// Users may only act on their own assessments; admins may act on any.
pub fn require_owner(
    auth: &AuthenticatedUser,
    owner_user_id: i64,
    assessment_id: i64,
) -> Result<(), AppError> {
    if auth.is_admin() || auth.user_id == owner_user_id {
        return Ok(());
    }

    tracing::warn!(
        user_id = auth.user_id,
        owner_user_id,
        assessment_id,
        decision = "deny",
        "assessment ownership decision"
    );
    Err(AppError::Forbidden {
        message: format!("Assessment {assessment_id} belongs to another user"),
    })
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authorization header must use Bearer scheme".to_string(),
            })?;

        let claims = state.tokens.verify(token).map_err(|e| match e {
            AuthError::Expired => AppError::Unauthorized {
                message: "Token has expired".to_string(),
            },
            other => AppError::Unauthorized {
                message: format!("Invalid token: {other}"),
            },
        })?;

        Ok(AuthenticatedUser {
            user_id: claims.user_id,
            role: claims.role,
            username: claims.username,
        })
    }
}
