use assessa_core::conversation::ConversationState;
use assessa_core::error::{ApiError, ApiResponse};
use assessa_core::extraction::AnalysisOutcome;
use assessa_core::history::{self, MessageType, SupplementaryAnswers};
use assessa_core::progression::{self, CompletedAssessment, ProgressEntry, QuestionnaireRef};
use assessa_core::questionnaire::TimerSettings;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, require_owner};
use crate::conversation_store::{self, NewMessage};
use crate::error::AppError;
use crate::extract::{AppJson, AppPath};
use crate::routes::questionnaires::fetch_questionnaire;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assessment/start/{id}", post(start_assessment))
        .route("/assessment/status", get(assessment_status))
        .route("/assessment/supplementary/{id}", get(supplementary_questions))
        .route("/assessment/finish/{id}", post(finish_assessment))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartAssessmentResponse {
    pub session_id: String,
    pub initial_message: String,
    pub assessment_id: i64,
    pub settings: TimerSettings,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SupplementaryQuestionsResponse {
    pub supplementary_question_1: String,
    pub supplementary_question_2: String,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct FinishAssessmentRequest {
    #[serde(default)]
    pub supplementary_answers: Option<SupplementaryAnswers>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FinishAssessmentResponse {
    pub assessment_id: i64,
    pub score: f64,
    pub max_score: Option<f64>,
    pub report: String,
    #[schema(value_type = Vec<Object>)]
    pub factor_scores: Vec<serde_json::Value>,
}

/// Internal row type for sqlx mapping
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AssessmentRow {
    pub id: i64,
    pub user_id: i64,
    pub questionnaire_id: i64,
    pub session_id: String,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Load an assessment and check the caller may act on it.
pub(crate) async fn fetch_owned_assessment(
    conn: &mut PgConnection,
    auth: &AuthenticatedUser,
    id: i64,
) -> Result<AssessmentRow, AppError> {
    let row = sqlx::query_as::<_, AssessmentRow>(
        "SELECT id, user_id, questionnaire_id, session_id, completed_at \
         FROM assessments WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound {
        resource: format!("Assessment {id}"),
    })?;

    require_owner(auth, row.user_id, row.id)?;
    Ok(row)
}

#[derive(sqlx::FromRow)]
struct CompletedRow {
    id: i64,
    questionnaire_id: i64,
    score: Option<f64>,
    max_score: Option<f64>,
    factor_scores: SqlJson<serde_json::Value>,
}

impl From<CompletedRow> for CompletedAssessment {
    fn from(row: CompletedRow) -> Self {
        let factor_scores = match row.factor_scores.0 {
            serde_json::Value::Array(items) => items,
            _ => Vec::new(),
        };
        CompletedAssessment {
            id: row.id,
            questionnaire_id: row.questionnaire_id,
            score: row.score,
            max_score: row.max_score,
            factor_scores,
        }
    }
}

/// Start an assessment
///
/// Creates the assessment row, seeds and persists the conversation state,
/// and logs the opening message as the first AI chat message.
#[utoipa::path(
    post,
    path = "/assessment/start/{id}",
    params(("id" = i64, Path, description = "Questionnaire id")),
    responses(
        (status = 200, description = "Session created; payload inside the success envelope", body = StartAssessmentResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Questionnaire not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "assessment"
)]
pub async fn start_assessment(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    AppPath(questionnaire_id): AppPath<i64>,
) -> Result<Json<ApiResponse<StartAssessmentResponse>>, AppError> {
    let mut tx = state.db.begin().await?;

    let questionnaire = fetch_questionnaire(&mut tx, questionnaire_id).await?;
    let session_id = Uuid::now_v7().to_string();

    let assessment_id: i64 = sqlx::query_scalar(
        "INSERT INTO assessments (user_id, questionnaire_id, session_id) \
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(auth.user_id)
    .bind(questionnaire_id)
    .bind(&session_id)
    .fetch_one(&mut *tx)
    .await?;

    let opening = questionnaire.opening_message(auth.username.as_deref());
    let conversation = ConversationState::seeded(&questionnaire, &opening);
    conversation_store::save_state(&mut tx, &session_id, &conversation).await?;
    conversation_store::append_message(
        &mut tx,
        NewMessage {
            assessment_id,
            session_id: &session_id,
            user_id: auth.user_id,
            message_type: MessageType::Ai,
            content: &opening,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = auth.user_id,
        questionnaire_id,
        assessment_id,
        session_id = %session_id,
        "Assessment started"
    );

    Ok(Json(ApiResponse::data(StartAssessmentResponse {
        session_id,
        initial_message: opening,
        assessment_id,
        settings: conversation.settings,
    })))
}

/// Progression of the authenticated user across all questionnaires
#[utoipa::path(
    get,
    path = "/assessment/status",
    responses(
        (status = 200, description = "One entry per questionnaire, inside the success envelope", body = Vec<ProgressEntry>),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "assessment"
)]
pub async fn assessment_status(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<ProgressEntry>>>, AppError> {
    let mut conn = state.db.acquire().await?;

    let questionnaires: Vec<QuestionnaireRef> = sqlx::query_as::<_, (i64, String, Option<String>)>(
        "SELECT id, name, description FROM questionnaires ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|(id, name, description)| QuestionnaireRef {
        id,
        name,
        description,
    })
    .collect();

    // Oldest first so the most recent completion wins in the merge.
    let completed: Vec<CompletedAssessment> = sqlx::query_as::<_, CompletedRow>(
        "SELECT id, questionnaire_id, score, max_score, factor_scores \
         FROM assessments \
         WHERE user_id = $1 AND completed_at IS NOT NULL \
         ORDER BY completed_at ASC, id ASC",
    )
    .bind(auth.user_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(CompletedAssessment::from)
    .collect();

    Ok(Json(ApiResponse::data(progression::compute_progression(
        &questionnaires,
        completed,
    ))))
}

/// Generate two follow-up questions from the chat so far
#[utoipa::path(
    get,
    path = "/assessment/supplementary/{id}",
    params(("id" = i64, Path, description = "Assessment id")),
    responses(
        (status = 200, description = "Questions inside the success envelope", body = SupplementaryQuestionsResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Assessment belongs to another user", body = ApiError),
        (status = 404, description = "Assessment or questionnaire not found", body = ApiError),
        (status = 500, description = "Model call failed", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "assessment"
)]
pub async fn supplementary_questions(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    AppPath(assessment_id): AppPath<i64>,
) -> Result<Json<ApiResponse<SupplementaryQuestionsResponse>>, AppError> {
    let (persona_prompt, transcript) = {
        let mut conn = state.db.acquire().await?;
        let assessment = fetch_owned_assessment(&mut conn, &auth, assessment_id).await?;
        let questionnaire = fetch_questionnaire(&mut conn, assessment.questionnaire_id).await?;
        let transcript = conversation_store::load_history(&mut conn, assessment_id).await?;
        (questionnaire.persona_prompt, transcript)
    };

    let questions = state
        .ai
        .supplementary_questions(&history::history_json(&transcript), &persona_prompt)
        .await?;

    Ok(Json(ApiResponse::data(SupplementaryQuestionsResponse {
        supplementary_question_1: questions.q1,
        supplementary_question_2: questions.q2,
    })))
}

/// Run the final analysis and record the score
#[utoipa::path(
    post,
    path = "/assessment/finish/{id}",
    params(("id" = i64, Path, description = "Assessment id")),
    request_body = FinishAssessmentRequest,
    responses(
        (status = 200, description = "Analysis stored; outcome inside the success envelope", body = FinishAssessmentResponse),
        (status = 400, description = "Invalid body", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Assessment belongs to another user", body = ApiError),
        (status = 404, description = "Assessment or questionnaire not found", body = ApiError),
        (status = 500, description = "Model call failed", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "assessment"
)]
pub async fn finish_assessment(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    AppPath(assessment_id): AppPath<i64>,
    AppJson(request): AppJson<FinishAssessmentRequest>,
) -> Result<Json<ApiResponse<FinishAssessmentResponse>>, AppError> {
    let (analysis_prompt, mut transcript) = {
        let mut conn = state.db.acquire().await?;
        let assessment = fetch_owned_assessment(&mut conn, &auth, assessment_id).await?;
        let questionnaire = fetch_questionnaire(&mut conn, assessment.questionnaire_id).await?;
        let transcript = conversation_store::load_history(&mut conn, assessment_id).await?;
        (questionnaire.analysis_prompt, transcript)
    };

    if let Some(answers) = &request.supplementary_answers {
        history::append_supplementary_answers(&mut transcript, answers);
    }

    let raw = state
        .ai
        .analyze(&history::history_json(&transcript), &analysis_prompt)
        .await?;
    let outcome = AnalysisOutcome::from_model_text(&raw);
    if !outcome.structured {
        tracing::warn!(assessment_id, "Analysis had no parseable JSON; storing raw text as report");
    }

    sqlx::query(
        "UPDATE assessments \
         SET score = $1, max_score = $2, description = $3, factor_scores = $4, completed_at = NOW() \
         WHERE id = $5",
    )
    .bind(outcome.score)
    .bind(outcome.max_score)
    .bind(&outcome.report)
    .bind(SqlJson(&outcome.factor_scores))
    .bind(assessment_id)
    .execute(&state.db)
    .await?;

    tracing::info!(
        user_id = auth.user_id,
        assessment_id,
        score = outcome.score,
        "Assessment finished"
    );

    Ok(Json(ApiResponse {
        success: true,
        data: Some(FinishAssessmentResponse {
            assessment_id,
            score: outcome.score,
            max_score: outcome.max_score,
            report: outcome.report,
            factor_scores: outcome.factor_scores,
        }),
        message: Some("Analysis completed successfully".to_string()),
    }))
}
