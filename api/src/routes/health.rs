use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: &'static str,
    /// "reachable" or "unreachable"
    pub database: &'static str,
    pub version: &'static str,
}

impl HealthResponse {
    fn from_db(db_ok: bool) -> (StatusCode, Self) {
        let status = if db_ok {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (
            status,
            Self {
                status: if db_ok { "ok" } else { "degraded" },
                database: if db_ok { "reachable" } else { "unreachable" },
                version: env!("CARGO_PKG_VERSION"),
            },
        )
    }
}

/// Liveness plus a database round trip; no authentication
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .inspect_err(|e| tracing::warn!("Health check database ping failed: {e}"))
        .is_ok();

    let (status, body) = HealthResponse::from_db(db_ok);
    (status, Json(body))
}
