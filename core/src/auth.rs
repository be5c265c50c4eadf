use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{other}' (expected 'admin' or 'user')")),
        }
    }
}

/// JWT payload carried by every bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Expiry as seconds since the Unix epoch
    pub exp: u64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("token lifetime of {0} hours is out of range")]
    ExpiryOutOfRange(i64),
}

/// HS256 signer/verifier around a shared secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            })
    }
}

/// Seconds-since-epoch expiry `ttl_hours` from now.
pub fn expiry_in_hours(ttl_hours: i64) -> Result<u64, AuthError> {
    let exp = chrono::TimeDelta::try_hours(ttl_hours)
        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
        .ok_or(AuthError::ExpiryOutOfRange(ttl_hours))?;
    Ok(exp.timestamp().max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role, exp: u64) -> Claims {
        Claims {
            user_id: 42,
            role,
            username: Some("sara".to_string()),
            exp,
        }
    }

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let keys = TokenKeys::from_secret(b"test-secret");
        let token = keys.issue(&claims(Role::Admin, expiry_in_hours(1).unwrap())).unwrap();
        let decoded = keys.verify(&token).unwrap();
        assert_eq!(decoded.user_id, 42);
        assert_eq!(decoded.role, Role::Admin);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = TokenKeys::from_secret(b"one")
            .issue(&claims(Role::User, expiry_in_hours(1).unwrap()))
            .unwrap();
        let err = TokenKeys::from_secret(b"two").verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let keys = TokenKeys::from_secret(b"test-secret");
        let token = keys.issue(&claims(Role::User, 1_000)).unwrap();
        assert!(matches!(keys.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn claims_use_camel_case_user_id() {
        let value = serde_json::to_value(claims(Role::User, 5)).unwrap();
        assert_eq!(value["userId"], 42);
        assert_eq!(value["role"], "user");
    }

    #[test]
    fn absurd_lifetime_is_rejected_instead_of_overflowing() {
        assert!(matches!(
            expiry_in_hours(9_999_999_999_999),
            Err(AuthError::ExpiryOutOfRange(9_999_999_999_999))
        ));
        assert!(matches!(expiry_in_hours(i64::MAX), Err(AuthError::ExpiryOutOfRange(_))));
        assert!(expiry_in_hours(24).unwrap() > expiry_in_hours(1).unwrap());
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }
}
