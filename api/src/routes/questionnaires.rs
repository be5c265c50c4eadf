use assessa_core::error::{ApiError, ApiResponse};
use assessa_core::questionnaire::{
    Questionnaire, QuestionnaireInput, QuestionnaireSummary, ValidQuestionnaire,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgConnection;

use crate::auth::{AuthenticatedUser, require_admin};
use crate::error::AppError;
use crate::extract::{AppJson, AppPath};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/questionnaires",
            get(list_questionnaires).post(create_questionnaire),
        )
        .route(
            "/admin/questionnaires/{id}",
            get(get_questionnaire).put(update_questionnaire),
        )
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreatedQuestionnaire {
    pub id: i64,
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
pub(crate) struct QuestionnaireRow {
    id: i64,
    name: String,
    description: Option<String>,
    initial_prompt: String,
    persona_name: Option<String>,
    persona_prompt: String,
    secondary_persona_name: Option<String>,
    secondary_persona_prompt: Option<String>,
    analysis_prompt: String,
    welcome_message: Option<String>,
    has_timer: bool,
    timer_duration: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuestionnaireRow> for Questionnaire {
    fn from(row: QuestionnaireRow) -> Self {
        Questionnaire {
            id: row.id,
            name: row.name,
            description: row.description,
            initial_prompt: row.initial_prompt,
            persona_name: row.persona_name,
            persona_prompt: row.persona_prompt,
            secondary_persona_name: row.secondary_persona_name,
            secondary_persona_prompt: row.secondary_persona_prompt,
            analysis_prompt: row.analysis_prompt,
            welcome_message: row.welcome_message,
            has_timer: row.has_timer,
            timer_duration: row.timer_duration,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Column list matching [`QuestionnaireRow`], prefixed with `q.`.
pub(crate) const QUESTIONNAIRE_COLUMNS: &str = "q.id, q.name, q.description, q.initial_prompt, \
     q.persona_name, q.persona_prompt, q.secondary_persona_name, q.secondary_persona_prompt, \
     q.analysis_prompt, q.welcome_message, q.has_timer, q.timer_duration, q.created_at, q.updated_at";

pub(crate) async fn fetch_questionnaire(
    conn: &mut PgConnection,
    id: i64,
) -> Result<Questionnaire, AppError> {
    let row = sqlx::query_as::<_, QuestionnaireRow>(&format!(
        "SELECT {QUESTIONNAIRE_COLUMNS} FROM questionnaires q WHERE q.id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Questionnaire::from).ok_or_else(|| AppError::NotFound {
        resource: format!("Questionnaire {id}"),
    })
}

fn validate(input: QuestionnaireInput) -> Result<ValidQuestionnaire, AppError> {
    input.validate().map_err(|errors| AppError::Validation {
        message: "Invalid questionnaire data".to_string(),
        errors,
    })
}

/// List questionnaires (id and name)
#[utoipa::path(
    get,
    path = "/admin/questionnaires",
    responses(
        (status = 200, description = "Questionnaires in id order, inside the success envelope", body = Vec<QuestionnaireSummary>),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "questionnaires"
)]
pub async fn list_questionnaires(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<QuestionnaireSummary>>>, AppError> {
    let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM questionnaires ORDER BY id")
        .fetch_all(&state.db)
        .await?;

    let summaries = rows
        .into_iter()
        .map(|(id, name)| QuestionnaireSummary { id, name })
        .collect();
    Ok(Json(ApiResponse::data(summaries)))
}

/// Create a questionnaire (admin only)
#[utoipa::path(
    post,
    path = "/admin/questionnaires",
    request_body = QuestionnaireInput,
    responses(
        (status = 201, description = "Created; id inside the success envelope", body = CreatedQuestionnaire),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Not an admin", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "questionnaires"
)]
pub async fn create_questionnaire(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    AppJson(input): AppJson<QuestionnaireInput>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedQuestionnaire>>), AppError> {
    require_admin(&auth, "POST /admin/questionnaires")?;
    let q = validate(input)?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO questionnaires (
            name, description, initial_prompt, persona_name, persona_prompt,
            secondary_persona_name, secondary_persona_prompt, analysis_prompt,
            welcome_message, has_timer, timer_duration
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id
        "#,
    )
    .bind(&q.name)
    .bind(&q.description)
    .bind(&q.initial_prompt)
    .bind(&q.persona_name)
    .bind(&q.persona_prompt)
    .bind(&q.secondary_persona_name)
    .bind(&q.secondary_persona_prompt)
    .bind(&q.analysis_prompt)
    .bind(&q.welcome_message)
    .bind(q.has_timer)
    .bind(q.timer_duration)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(admin_user_id = auth.user_id, questionnaire_id = id, "Questionnaire created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(CreatedQuestionnaire { id })),
    ))
}

/// Get a full questionnaire definition (admin only)
#[utoipa::path(
    get,
    path = "/admin/questionnaires/{id}",
    params(("id" = i64, Path, description = "Questionnaire id")),
    responses(
        (status = 200, description = "Questionnaire inside the success envelope", body = Questionnaire),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Not an admin", body = ApiError),
        (status = 404, description = "Questionnaire not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "questionnaires"
)]
pub async fn get_questionnaire(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ApiResponse<Questionnaire>>, AppError> {
    require_admin(&auth, "GET /admin/questionnaires/{id}")?;
    let mut conn = state.db.acquire().await?;
    let questionnaire = fetch_questionnaire(&mut conn, id).await?;
    Ok(Json(ApiResponse::data(questionnaire)))
}

/// Replace a questionnaire's editable fields (admin only)
#[utoipa::path(
    put,
    path = "/admin/questionnaires/{id}",
    params(("id" = i64, Path, description = "Questionnaire id")),
    request_body = QuestionnaireInput,
    responses(
        (status = 200, description = "Updated; message-only success envelope"),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Not an admin", body = ApiError),
        (status = 404, description = "Questionnaire not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "questionnaires"
)]
pub async fn update_questionnaire(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(input): AppJson<QuestionnaireInput>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    require_admin(&auth, "PUT /admin/questionnaires/{id}")?;
    let q = validate(input)?;

    let result = sqlx::query(
        r#"
        UPDATE questionnaires SET
            name = $1, description = $2, initial_prompt = $3, persona_name = $4,
            persona_prompt = $5, secondary_persona_name = $6, secondary_persona_prompt = $7,
            analysis_prompt = $8, welcome_message = $9, has_timer = $10, timer_duration = $11,
            updated_at = NOW()
        WHERE id = $12
        "#,
    )
    .bind(&q.name)
    .bind(&q.description)
    .bind(&q.initial_prompt)
    .bind(&q.persona_name)
    .bind(&q.persona_prompt)
    .bind(&q.secondary_persona_name)
    .bind(&q.secondary_persona_prompt)
    .bind(&q.analysis_prompt)
    .bind(&q.welcome_message)
    .bind(q.has_timer)
    .bind(q.timer_duration)
    .bind(id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound {
            resource: format!("Questionnaire {id}"),
        });
    }

    tracing::info!(admin_user_id = auth.user_id, questionnaire_id = id, "Questionnaire updated");
    Ok(Json(ApiResponse::message("Questionnaire updated successfully.")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assessa_core::auth::Role;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::testing::{ScriptedModel, bearer, body_json, offline_state};

    fn app() -> Router {
        router().with_state(offline_state(Arc::new(ScriptedModel::new(&[]))))
    }

    fn post(auth: Option<String>, body: serde_json::Value) -> Request<Body> {
        let mut request = Request::post("/admin/questionnaires").header("content-type", "application/json");
        if let Some(auth) = auth {
            request = request.header("authorization", auth);
        }
        request.body(Body::from(body.to_string())).unwrap()
    }

    fn valid_body() -> serde_json::Value {
        serde_json::json!({
            "name": "Leadership",
            "initial_prompt": "Hi {user_name}, let's talk about leadership.",
            "persona_prompt": "You are a thoughtful leadership coach.",
            "analysis_prompt": "Score leadership from 0 to 10 as JSON."
        })
    }

    #[tokio::test]
    async fn create_without_token_is_unauthorized() {
        let response = app().oneshot(post(None, valid_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn create_as_regular_user_is_forbidden() {
        let response = app()
            .oneshot(post(Some(bearer(3, Role::User)), valid_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn create_with_short_prompts_lists_field_errors() {
        let body = serde_json::json!({
            "name": "Le",
            "initial_prompt": "too short",
            "persona_prompt": "You are a thoughtful leadership coach.",
            "analysis_prompt": "Score leadership from 0 to 10 as JSON."
        });
        let response = app()
            .oneshot(post(Some(bearer(1, Role::Admin)), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["name", "initial_prompt"]);
    }

    #[tokio::test]
    async fn create_with_missing_field_names_it() {
        let response = app()
            .oneshot(post(Some(bearer(1, Role::Admin)), serde_json::json!({"name": "Leadership"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["field"], "initial_prompt");
    }

    #[tokio::test]
    async fn non_numeric_id_is_a_validation_error() {
        let response = app()
            .oneshot(
                Request::get("/admin/questionnaires/abc")
                    .header("authorization", bearer(1, Role::Admin))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
