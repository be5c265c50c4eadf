use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::questionnaire::{Questionnaire, TimerSettings};

/// Marker the interviewing persona emits when it considers the conversation done.
pub const END_OF_CONVERSATION_MARKER: &str = "[END_OF_CONVERSATION]";

/// Reply from the observer persona meaning "nothing to add".
pub const NO_INTERVENTION_SENTINEL: &str = "__NO_INTERVENTION__";

/// First user turn of every seeded conversation.
pub const SEED_GREETING: &str = "Hello";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Part {
    pub text: String,
}

/// One turn of model-facing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Turn {
    pub role: TurnRole,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Snapshot of a session, persisted as JSON in `assessment_states`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub history: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_persona_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_persona_prompt: Option<String>,
    pub settings: TimerSettings,
}

impl ConversationState {
    /// State with no history, carrying the questionnaire's personas and timer.
    pub fn empty_for(questionnaire: &Questionnaire) -> Self {
        Self {
            history: Vec::new(),
            persona_name: questionnaire.persona_name.clone(),
            persona_prompt: Some(questionnaire.persona_prompt.clone()),
            secondary_persona_name: questionnaire.secondary_persona_name.clone(),
            secondary_persona_prompt: questionnaire.secondary_persona_prompt.clone(),
            settings: questionnaire.timer_settings(),
        }
    }

    /// State created at assessment start: a greeting from the user answered
    /// by the opening message.
    pub fn seeded(questionnaire: &Questionnaire, opening_message: &str) -> Self {
        let mut state = Self::empty_for(questionnaire);
        state.history.push(Turn::user(SEED_GREETING));
        state.history.push(Turn::model(opening_message));
        state
    }

    /// Observer prompt, if the questionnaire configures a usable one.
    pub fn observer_prompt(&self) -> Option<&str> {
        self.secondary_persona_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }
}

/// Remove every occurrence of the completion marker (case-insensitive) and
/// report whether one was present.
pub fn strip_completion_marker(reply: &str) -> (String, bool) {
    let marker = END_OF_CONVERSATION_MARKER.to_ascii_lowercase();
    let lowered = reply.to_ascii_lowercase();
    if !lowered.contains(&marker) {
        return (reply.trim().to_string(), false);
    }

    // ASCII lowercasing keeps byte offsets aligned with the original.
    let mut cleaned = String::with_capacity(reply.len());
    let mut cursor = 0;
    while let Some(offset) = lowered[cursor..].find(&marker) {
        let start = cursor + offset;
        cleaned.push_str(&reply[cursor..start]);
        cursor = start + marker.len();
    }
    cleaned.push_str(&reply[cursor..]);
    (cleaned.trim().to_string(), true)
}

/// Interpret the observer persona's reply. `None` means no intervention.
pub fn parse_intervention(reply: &str) -> Option<String> {
    let trimmed = reply.trim();
    if trimmed.is_empty() || trimmed == NO_INTERVENTION_SENTINEL {
        None
    } else {
        Some(trimmed.to_string())
    }
}
