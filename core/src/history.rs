use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Author of a persisted chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Ai,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Ai => "ai",
        }
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageType::User),
            "ai" => Ok(MessageType::Ai),
            other => Err(format!("unknown message_type '{other}'")),
        }
    }
}

/// One line of the transcript handed to the analysis and follow-up prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    pub message_type: MessageType,
    pub content: String,
}

/// Answers to the supplementary questions, sent with the finish request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SupplementaryAnswers {
    #[serde(default)]
    pub q1: Option<String>,
    #[serde(default)]
    pub q2: Option<String>,
}

/// Append the non-empty supplementary answers as user messages.
pub fn append_supplementary_answers(history: &mut Vec<HistoryEntry>, answers: &SupplementaryAnswers) {
    let labelled = [(1, answers.q1.as_deref()), (2, answers.q2.as_deref())];
    for (index, answer) in labelled {
        if let Some(answer) = answer.filter(|a| !a.trim().is_empty()) {
            history.push(HistoryEntry {
                message_type: MessageType::User,
                content: format!("Supplementary answer {index}: {answer}"),
            });
        }
    }
}

/// Pretty JSON transcript embedded in model prompts.
pub fn history_json(history: &[HistoryEntry]) -> String {
    // A Vec of plain structs cannot fail to serialize.
    serde_json::to_string_pretty(history).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_present_answers_are_appended() {
        let mut history = vec![HistoryEntry {
            message_type: MessageType::Ai,
            content: "Welcome".to_string(),
        }];
        let answers = SupplementaryAnswers {
            q1: None,
            q2: Some("I learned to delegate.".to_string()),
        };
        append_supplementary_answers(&mut history, &answers);

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].message_type, MessageType::User);
        assert_eq!(history[1].content, "Supplementary answer 2: I learned to delegate.");
    }

    #[test]
    fn blank_answers_are_skipped() {
        let mut history = Vec::new();
        let answers = SupplementaryAnswers {
            q1: Some("  ".to_string()),
            q2: None,
        };
        append_supplementary_answers(&mut history, &answers);
        assert!(history.is_empty());
    }

    #[test]
    fn transcript_json_uses_snake_case_fields() {
        let history = vec![HistoryEntry {
            message_type: MessageType::User,
            content: "hi".to_string(),
        }];
        let value: serde_json::Value = serde_json::from_str(&history_json(&history)).unwrap();
        assert_eq!(value[0]["message_type"], "user");
        assert_eq!(value[0]["content"], "hi");
    }
}
