//! Persistence for conversation snapshots (`assessment_states`) and the
//! append-only chat log (`chat_messages`).

use assessa_core::conversation::ConversationState;
use assessa_core::history::{HistoryEntry, MessageType};
use assessa_core::questionnaire::Questionnaire;
use sqlx::PgConnection;
use sqlx::types::Json;

use crate::error::AppError;
use crate::routes::questionnaires::{QUESTIONNAIRE_COLUMNS, QuestionnaireRow};

/// Upsert the snapshot for a session. Last write wins.
pub async fn save_state(
    conn: &mut PgConnection,
    session_id: &str,
    state: &ConversationState,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO assessment_states (session_id, state_data, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (session_id)
        DO UPDATE SET state_data = EXCLUDED.state_data, updated_at = NOW()
        "#,
    )
    .bind(session_id)
    .bind(Json(state))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Stored snapshot for the session, or a fresh one rebuilt from the
/// questionnaire behind `assessment_id` when nothing was saved.
pub async fn load_state(
    conn: &mut PgConnection,
    session_id: &str,
    assessment_id: i64,
) -> Result<ConversationState, AppError> {
    let stored: Option<Json<ConversationState>> =
        sqlx::query_scalar("SELECT state_data FROM assessment_states WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&mut *conn)
            .await?;

    if let Some(Json(state)) = stored {
        return Ok(state);
    }

    tracing::info!(
        session_id = session_id,
        assessment_id,
        "No stored conversation state, rebuilding from questionnaire"
    );

    let row = sqlx::query_as::<_, QuestionnaireRow>(&format!(
        "SELECT {QUESTIONNAIRE_COLUMNS} \
         FROM questionnaires q JOIN assessments a ON q.id = a.questionnaire_id \
         WHERE a.id = $1"
    ))
    .bind(assessment_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound {
        resource: format!("Questionnaire for session {session_id}"),
    })?;

    Ok(ConversationState::empty_for(&Questionnaire::from(row)))
}

/// One row for `chat_messages`.
pub struct NewMessage<'a> {
    pub assessment_id: i64,
    pub session_id: &'a str,
    pub user_id: i64,
    pub message_type: MessageType,
    pub content: &'a str,
}

pub async fn append_message(conn: &mut PgConnection, message: NewMessage<'_>) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO chat_messages (assessment_id, session_id, user_id, message_type, content) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(message.assessment_id)
    .bind(message.session_id)
    .bind(message.user_id)
    .bind(message.message_type.as_str())
    .bind(message.content)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Persisted transcript of an assessment, oldest first.
pub async fn load_history(
    conn: &mut PgConnection,
    assessment_id: i64,
) -> Result<Vec<HistoryEntry>, AppError> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT message_type, content FROM chat_messages \
         WHERE assessment_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(assessment_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(message_type, content)| {
            let message_type = message_type.parse::<MessageType>().map_err(AppError::Internal)?;
            Ok(HistoryEntry {
                message_type,
                content,
            })
        })
        .collect()
}
