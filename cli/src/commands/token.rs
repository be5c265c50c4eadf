use assessa_core::auth::{Claims, Role, TokenKeys, expiry_in_hours};
use clap::Subcommand;
use serde_json::json;

use crate::util::exit_error;

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Mint a bearer token signed with the server's JWT secret (dev/ops use)
    Mint {
        /// Numeric user id carried in the token
        #[arg(long)]
        user_id: i64,
        /// "admin" or "user"
        #[arg(long, default_value = "user")]
        role: Role,
        /// Display name substituted into {user_name} prompts
        #[arg(long)]
        username: Option<String>,
        /// Lifetime in hours
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
        /// Signing secret
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
    },
}

pub fn run(command: TokenCommands) -> i32 {
    match command {
        TokenCommands::Mint {
            user_id,
            role,
            username,
            ttl_hours,
            secret,
        } => mint(user_id, role, username, ttl_hours, &secret),
    }
}

fn mint(user_id: i64, role: Role, username: Option<String>, ttl_hours: i64, secret: &str) -> i32 {
    let claims = match build_claims(user_id, role, username, ttl_hours) {
        Ok(claims) => claims,
        Err(message) => exit_error(&message, Some("Use a --ttl-hours value between 1 and a few years.")),
    };
    match TokenKeys::from_secret(secret.as_bytes()).issue(&claims) {
        Ok(token) => {
            let out = json!({
                "token": token,
                "user_id": user_id,
                "role": role.as_str(),
                "expires_at": claims.exp
            });
            println!("{}", serde_json::to_string_pretty(&out).unwrap_or(token));
            0
        }
        Err(e) => exit_error(&e.to_string(), None),
    }
}

fn build_claims(
    user_id: i64,
    role: Role,
    username: Option<String>,
    ttl_hours: i64,
) -> Result<Claims, String> {
    if ttl_hours <= 0 {
        return Err("--ttl-hours must be positive".to_string());
    }
    let exp = expiry_in_hours(ttl_hours).map_err(|e| e.to_string())?;
    Ok(Claims {
        user_id,
        role,
        username,
        exp,
    })
}
