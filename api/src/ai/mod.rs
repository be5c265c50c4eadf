//! Language model access.
//!
//! [`LanguageModel`] is the raw text-generation seam; [`AiGateway`] builds the
//! four request shapes the assessment flow needs on top of it. The gateway is
//! constructed once in `main` and injected through `AppState`.

pub mod gemini;

use std::sync::Arc;

use assessa_core::conversation::{self, Turn};
use assessa_core::extraction::{self, SupplementaryQuestions};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("language model configuration error: {0}")]
    Config(String),
    #[error("language model request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("language model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("language model returned an empty response")]
    EmptyResponse,
    #[error("language model returned malformed output: {0}")]
    Malformed(String),
}

/// One generation call: optional system instruction plus ordered turns.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub contents: Vec<Turn>,
}

impl GenerateRequest {
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            system_instruction: None,
            contents: vec![Turn::user(text)],
        }
    }
}

/// Text generation backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a reply. Implementations return `AiError::EmptyResponse`
    /// rather than an empty string.
    async fn generate(&self, request: GenerateRequest) -> Result<String, AiError>;
}

/// Reply from the interviewing persona.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationReply {
    pub text: String,
    pub is_complete: bool,
}

const OBSERVER_INSTRUCTIONS: &str = "You are observing a conversation between a user and an \
interviewer. Based on your role, decide whether you need to intervene. If you do, write your \
message. Otherwise reply with exactly '__NO_INTERVENTION__' and nothing else.";

#[derive(Clone)]
pub struct AiGateway {
    model: Arc<dyn LanguageModel>,
}

impl AiGateway {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Continue the chat with the persona as system instruction. The history
    /// must end with the user's latest turn.
    pub async fn continue_conversation(
        &self,
        history: &[Turn],
        persona_prompt: Option<&str>,
    ) -> Result<ConversationReply, AiError> {
        let request = GenerateRequest {
            system_instruction: persona_prompt
                .filter(|p| !p.trim().is_empty())
                .map(str::to_string),
            contents: history.to_vec(),
        };
        let raw = self.model.generate(request).await?;
        let (text, is_complete) = conversation::strip_completion_marker(&raw);
        Ok(ConversationReply { text, is_complete })
    }

    /// Ask the observer persona whether to interject. `None` means no action.
    pub async fn check_intervention(
        &self,
        history: &[Turn],
        secondary_persona_prompt: &str,
    ) -> Result<Option<String>, AiError> {
        let request = GenerateRequest {
            system_instruction: Some(format!("{secondary_persona_prompt}\n\n{OBSERVER_INSTRUCTIONS}")),
            contents: history.to_vec(),
        };
        match self.model.generate(request).await {
            Ok(raw) => Ok(conversation::parse_intervention(&raw)),
            // An empty or blocked observer reply means it has nothing to add.
            Err(AiError::EmptyResponse) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Final scoring pass; returns free text expected to embed a JSON object.
    pub async fn analyze(&self, history_json: &str, analysis_prompt: &str) -> Result<String, AiError> {
        let prompt = format!("{analysis_prompt}\n\nConversation history as JSON:\n{history_json}");
        self.model.generate(GenerateRequest::prompt(prompt)).await
    }

    pub async fn supplementary_questions(
        &self,
        history_json: &str,
        persona_prompt: &str,
    ) -> Result<SupplementaryQuestions, AiError> {
        let prompt = format!(
            "Based on the conversation history below, and given that the interviewer's persona was: \
             \"{persona_prompt}\", write two short, insightful follow-up questions that deepen the \
             understanding of the user. Output only a JSON object with the keys \"q1\" and \"q2\".\n\n\
             {history_json}"
        );
        let raw = self.model.generate(GenerateRequest::prompt(prompt)).await?;
        extraction::parse_supplementary_questions(&raw).map_err(|e| AiError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use assessa_core::conversation::TurnRole;

    fn gateway(replies: &[&str]) -> (AiGateway, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel::new(replies));
        (AiGateway::new(model.clone()), model)
    }

    #[tokio::test]
    async fn conversation_reply_detects_and_strips_marker() {
        let (gateway, model) = gateway(&["That's all I needed. [END_OF_CONVERSATION]"]);
        let history = vec![Turn::user("Hello"), Turn::model("Hi"), Turn::user("I'm done")];

        let reply = gateway
            .continue_conversation(&history, Some("You are a coach."))
            .await
            .unwrap();
        assert!(reply.is_complete);
        assert_eq!(reply.text, "That's all I needed.");

        let sent = model.requests();
        assert_eq!(sent[0].system_instruction.as_deref(), Some("You are a coach."));
        assert_eq!(sent[0].contents.len(), 3);
        assert_eq!(sent[0].contents[2].role, TurnRole::User);
    }

    #[tokio::test]
    async fn blank_persona_sends_no_system_instruction() {
        let (gateway, model) = gateway(&["ok"]);
        gateway
            .continue_conversation(&[Turn::user("hi")], Some("  "))
            .await
            .unwrap();
        assert_eq!(model.requests()[0].system_instruction, None);
    }

    #[tokio::test]
    async fn sentinel_reply_means_no_intervention() {
        let (gateway, model) = gateway(&["__NO_INTERVENTION__", "Please stay on topic."]);
        let history = vec![Turn::user("hi")];

        assert_eq!(gateway.check_intervention(&history, "Observer").await.unwrap(), None);
        assert_eq!(
            gateway.check_intervention(&history, "Observer").await.unwrap(),
            Some("Please stay on topic.".to_string())
        );
        let instruction = model.requests()[0].system_instruction.clone().unwrap();
        assert!(instruction.starts_with("Observer"));
        assert!(instruction.contains("__NO_INTERVENTION__"));
    }

    #[tokio::test]
    async fn empty_observer_reply_means_no_intervention() {
        let (gateway, model) = gateway(&[]);
        let outcome = gateway
            .check_intervention(&[Turn::user("hi")], "Observer")
            .await
            .unwrap();
        assert_eq!(outcome, None);
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn observer_transport_errors_still_propagate() {
        let gateway = AiGateway::new(Arc::new(FailingModel));
        let err = gateway
            .check_intervention(&[Turn::user("hi")], "Observer")
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Status { status: 503, .. }));
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn generate(&self, _request: GenerateRequest) -> Result<String, AiError> {
            Err(AiError::Status {
                status: 503,
                body: "overloaded".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn analysis_prompt_embeds_history() {
        let (gateway, model) = gateway(&["{\"score\": 3}"]);
        let raw = gateway.analyze("[]", "Score this.").await.unwrap();
        assert_eq!(raw, "{\"score\": 3}");

        let prompt = model.requests()[0].contents[0].text();
        assert!(prompt.starts_with("Score this."));
        assert!(prompt.ends_with("[]"));
    }

    #[tokio::test]
    async fn fenced_supplementary_reply_is_parsed() {
        let (gateway, _) = gateway(&["```json\n{\"q1\": \"Why?\", \"q2\": \"How?\"}\n```"]);
        let questions = gateway.supplementary_questions("[]", "coach").await.unwrap();
        assert_eq!(questions.q1, "Why?");
        assert_eq!(questions.q2, "How?");
    }

    #[tokio::test]
    async fn unparseable_supplementary_reply_is_an_error() {
        let (gateway, _) = gateway(&["Here are two questions: why and how"]);
        let err = gateway.supplementary_questions("[]", "coach").await.unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));
    }

    #[tokio::test]
    async fn exhausted_model_propagates_empty_response() {
        let (gateway, _) = gateway(&[]);
        let err = gateway.analyze("[]", "Score").await.unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse));
    }
}
