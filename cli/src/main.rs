use clap::{Parser, Subcommand};

mod commands;
mod util;

use commands::assessment::AssessmentCommands;
use commands::questionnaire::QuestionnaireCommands;
use commands::token::TokenCommands;

#[derive(Parser)]
#[command(
    name = "assessa",
    version,
    about = "Assessa CLI: manage questionnaires and run conversational assessments"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "ASSESSA_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Bearer token (JWT) sent as `Authorization: Bearer <token>`
    #[arg(long, env = "ASSESSA_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Bearer token helpers
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Questionnaire administration
    Questionnaire {
        #[command(subcommand)]
        command: QuestionnaireCommands,
    },
    /// Assessment lifecycle: start, chat, status, supplementary, finish
    Assessment {
        #[command(subcommand)]
        command: AssessmentCommands,
    },
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let token = cli.token.as_deref();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Token { command } => commands::token::run(command),
        Commands::Questionnaire { command } => {
            commands::questionnaire::run(&cli.api_url, token, command).await
        }
        Commands::Assessment { command } => {
            commands::assessment::run(&cli.api_url, token, command).await
        }
    };

    std::process::exit(code);
}
