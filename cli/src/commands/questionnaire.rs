use clap::Subcommand;

use crate::util::{api_request, exit_error, read_json_from_file, require_token};

#[derive(Subcommand)]
pub enum QuestionnaireCommands {
    /// List questionnaires (id and name)
    List,
    /// Show a full questionnaire definition (admin)
    Get {
        #[arg(long)]
        id: i64,
    },
    /// Create a questionnaire from a JSON file, or "-" for stdin (admin)
    Create {
        #[arg(long)]
        file: String,
    },
    /// Replace a questionnaire's fields from a JSON file (admin)
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        file: String,
    },
}

pub async fn run(api_url: &str, token: Option<&str>, command: QuestionnaireCommands) -> i32 {
    let token = require_token(token);
    match command {
        QuestionnaireCommands::List => {
            api_request(api_url, reqwest::Method::GET, "/admin/questionnaires", Some(token), None)
                .await
        }
        QuestionnaireCommands::Get { id } => {
            api_request(
                api_url,
                reqwest::Method::GET,
                &format!("/admin/questionnaires/{id}"),
                Some(token),
                None,
            )
            .await
        }
        QuestionnaireCommands::Create { file } => {
            let body = load_body(&file);
            api_request(
                api_url,
                reqwest::Method::POST,
                "/admin/questionnaires",
                Some(token),
                Some(body),
            )
            .await
        }
        QuestionnaireCommands::Update { id, file } => {
            let body = load_body(&file);
            api_request(
                api_url,
                reqwest::Method::PUT,
                &format!("/admin/questionnaires/{id}"),
                Some(token),
                Some(body),
            )
            .await
        }
    }
}

fn load_body(file: &str) -> serde_json::Value {
    read_json_from_file(file).unwrap_or_else(|e| {
        exit_error(
            &e,
            Some("The file must hold a questionnaire object: name, initial_prompt, persona_prompt, analysis_prompt, ..."),
        )
    })
}
