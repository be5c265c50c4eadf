use assessa_core::conversation::Turn;
use assessa_core::error::{ApiError, ApiResponse};
use assessa_core::history::MessageType;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedUser;
use crate::conversation_store::{self, NewMessage};
use crate::error::AppError;
use crate::extract::{AppJson, AppPath};
use crate::routes::assessment::fetch_owned_assessment;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/assessment/chat/{id}", post(chat_turn))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ChatTurnRequest {
    /// Must match the assessment's session when given
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Intervention {
    pub persona_name: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ChatTurnResponse {
    pub reply: String,
    /// The interviewer signalled the end of the conversation
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervention: Option<Intervention>,
}

/// Send one user message and get the interviewer's reply
///
/// Loads (or rebuilds) the session state, asks the interviewing persona for a
/// reply, lets the observer persona interject, then persists the chat log and
/// the new state in one transaction.
#[utoipa::path(
    post,
    path = "/assessment/chat/{id}",
    params(("id" = i64, Path, description = "Assessment id")),
    request_body = ChatTurnRequest,
    responses(
        (status = 200, description = "Reply inside the success envelope", body = ChatTurnResponse),
        (status = 400, description = "Empty message or session mismatch", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Assessment belongs to another user", body = ApiError),
        (status = 404, description = "Assessment not found", body = ApiError),
        (status = 409, description = "Assessment already completed", body = ApiError),
        (status = 500, description = "Model call failed", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "assessment"
)]
pub async fn chat_turn(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    AppPath(assessment_id): AppPath<i64>,
    AppJson(request): AppJson<ChatTurnRequest>,
) -> Result<Json<ApiResponse<ChatTurnResponse>>, AppError> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(AppError::validation("message", "message must not be empty"));
    }

    let (assessment, mut conversation) = {
        let mut conn = state.db.acquire().await?;
        let assessment = fetch_owned_assessment(&mut conn, &auth, assessment_id).await?;
        if let Some(session_id) = &request.session_id {
            if session_id != &assessment.session_id {
                return Err(AppError::validation(
                    "session_id",
                    format!("session_id does not belong to assessment {assessment_id}"),
                ));
            }
        }
        if assessment.completed_at.is_some() {
            return Err(AppError::Conflict {
                message: format!("Assessment {assessment_id} is already completed"),
            });
        }
        let conversation =
            conversation_store::load_state(&mut conn, &assessment.session_id, assessment_id).await?;
        (assessment, conversation)
    };

    conversation.history.push(Turn::user(message.clone()));
    let reply = state
        .ai
        .continue_conversation(&conversation.history, conversation.persona_prompt.as_deref())
        .await?;
    conversation.history.push(Turn::model(reply.text.clone()));

    let mut intervention = None;
    if !reply.is_complete {
        if let Some(observer_prompt) = conversation.observer_prompt() {
            let observer_prompt = observer_prompt.to_string();
            if let Some(text) = state
                .ai
                .check_intervention(&conversation.history, &observer_prompt)
                .await?
            {
                conversation.history.push(Turn::model(text.clone()));
                intervention = Some(Intervention {
                    persona_name: conversation.secondary_persona_name.clone(),
                    message: text,
                });
            }
        }
    }

    let mut tx = state.db.begin().await?;
    let session_id = assessment.session_id.as_str();
    let log = [
        (MessageType::User, message.as_str()),
        (MessageType::Ai, reply.text.as_str()),
    ];
    for (message_type, content) in log
        .into_iter()
        .chain(intervention.as_ref().map(|i| (MessageType::Ai, i.message.as_str())))
    {
        conversation_store::append_message(
            &mut tx,
            NewMessage {
                assessment_id,
                session_id,
                user_id: auth.user_id,
                message_type,
                content,
            },
        )
        .await?;
    }
    conversation_store::save_state(&mut tx, session_id, &conversation).await?;
    tx.commit().await?;

    tracing::info!(
        user_id = auth.user_id,
        assessment_id,
        is_complete = reply.is_complete,
        intervened = intervention.is_some(),
        "Chat turn recorded"
    );

    Ok(Json(ApiResponse::data(ChatTurnResponse {
        reply: reply.text,
        is_complete: reply.is_complete,
        intervention,
    })))
}
