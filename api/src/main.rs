use std::net::SocketAddr;
use std::sync::Arc;

use assessa_core::auth::TokenKeys;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod ai;
mod auth;
mod conversation_store;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;
#[cfg(test)]
mod testing;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Assessa API",
        version = "0.1.0",
        description = "Conversational assessments: questionnaires, AI-driven interviews, scoring and progression."
    ),
    paths(
        routes::health::health_check,
        routes::questionnaires::list_questionnaires,
        routes::questionnaires::create_questionnaire,
        routes::questionnaires::get_questionnaire,
        routes::questionnaires::update_questionnaire,
        routes::assessment::start_assessment,
        routes::assessment::assessment_status,
        routes::assessment::supplementary_questions,
        routes::assessment::finish_assessment,
        routes::conversation::chat_turn,
    ),
    components(schemas(
        routes::health::HealthResponse,
        assessa_core::error::ApiError,
        assessa_core::error::FieldError,
        assessa_core::questionnaire::Questionnaire,
        assessa_core::questionnaire::QuestionnaireSummary,
        assessa_core::questionnaire::QuestionnaireInput,
        assessa_core::questionnaire::TimerSettings,
        assessa_core::progression::ProgressEntry,
        assessa_core::progression::ProgressStatus,
        assessa_core::history::SupplementaryAnswers,
        routes::questionnaires::CreatedQuestionnaire,
        routes::assessment::StartAssessmentResponse,
        routes::assessment::SupplementaryQuestionsResponse,
        routes::assessment::FinishAssessmentRequest,
        routes::assessment::FinishAssessmentResponse,
        routes::conversation::ChatTurnRequest,
        routes::conversation::ChatTurnResponse,
        routes::conversation::Intervention,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assessa_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Model client first: a missing API key must stop startup before anything else
    let gemini_settings =
        ai::gemini::GeminiSettings::from_env().expect("Language model configuration is invalid");
    let gemini = ai::gemini::GeminiClient::new(gemini_settings)
        .expect("Failed to build language model HTTP client");

    let jwt_secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");

    // Database connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let max_connections: u32 = std::env::var("DATABASE_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let app_state = state::AppState {
        db: pool,
        tokens: TokenKeys::from_secret(jwt_secret.as_bytes()),
        ai: ai::AiGateway::new(Arc::new(gemini)),
    };

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::questionnaires::router())
        .merge(routes::assessment::router())
        .merge(routes::conversation::router())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::cors::build_cors_layer()),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Assessa API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
