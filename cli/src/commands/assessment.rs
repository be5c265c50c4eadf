use clap::Subcommand;
use serde_json::json;

use crate::util::{api_request, require_token};

#[derive(Subcommand)]
pub enum AssessmentCommands {
    /// Start an assessment for a questionnaire
    Start {
        #[arg(long)]
        questionnaire_id: i64,
    },
    /// Send one message in a running assessment
    Chat {
        #[arg(long)]
        assessment_id: i64,
        #[arg(long)]
        message: String,
        /// Session id returned by `start` (checked against the assessment)
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Show completed/current/locked status for every questionnaire
    Status,
    /// Generate the two follow-up questions
    Supplementary {
        #[arg(long)]
        assessment_id: i64,
    },
    /// Run the final analysis, optionally with follow-up answers
    Finish {
        #[arg(long)]
        assessment_id: i64,
        #[arg(long)]
        answer1: Option<String>,
        #[arg(long)]
        answer2: Option<String>,
    },
}

pub async fn run(api_url: &str, token: Option<&str>, command: AssessmentCommands) -> i32 {
    let token = Some(require_token(token));
    match command {
        AssessmentCommands::Start { questionnaire_id } => {
            api_request(
                api_url,
                reqwest::Method::POST,
                &format!("/assessment/start/{questionnaire_id}"),
                token,
                None,
            )
            .await
        }
        AssessmentCommands::Chat {
            assessment_id,
            message,
            session_id,
        } => {
            let mut body = json!({ "message": message });
            if let Some(session_id) = session_id {
                body["session_id"] = json!(session_id);
            }
            api_request(
                api_url,
                reqwest::Method::POST,
                &format!("/assessment/chat/{assessment_id}"),
                token,
                Some(body),
            )
            .await
        }
        AssessmentCommands::Status => {
            api_request(api_url, reqwest::Method::GET, "/assessment/status", token, None).await
        }
        AssessmentCommands::Supplementary { assessment_id } => {
            api_request(
                api_url,
                reqwest::Method::GET,
                &format!("/assessment/supplementary/{assessment_id}"),
                token,
                None,
            )
            .await
        }
        AssessmentCommands::Finish {
            assessment_id,
            answer1,
            answer2,
        } => {
            api_request(
                api_url,
                reqwest::Method::POST,
                &format!("/assessment/finish/{assessment_id}"),
                token,
                Some(finish_body(answer1, answer2)),
            )
            .await
        }
    }
}

fn finish_body(answer1: Option<String>, answer2: Option<String>) -> serde_json::Value {
    if answer1.is_none() && answer2.is_none() {
        return json!({});
    }
    json!({
        "supplementary_answers": { "q1": answer1, "q2": answer2 }
    })
}

#[cfg(test)]
mod tests {
    use super::finish_body;

    #[test]
    fn finish_body_omits_answers_when_none_given() {
        assert_eq!(finish_body(None, None), serde_json::json!({}));
    }

    #[test]
    fn finish_body_sends_partial_answers() {
        let body = finish_body(None, Some("Because".to_string()));
        assert_eq!(body["supplementary_answers"]["q2"], "Because");
        assert!(body["supplementary_answers"]["q1"].is_null());
    }
}
