use assessa_core::auth::TokenKeys;
use sqlx::PgPool;

use crate::ai::AiGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Verifies bearer tokens (HS256, `JWT_SECRET`)
    pub tokens: TokenKeys,
    pub ai: AiGateway,
}
