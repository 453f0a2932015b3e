use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    env_config::JwtConfig,
    error::{AppError, Res},
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub user_id: Uuid,
    pub role: Role,
    pub exp: usize,
}

impl JwtClaims {
    /// Admin-only operations carry the caller's id into the audit trail,
    /// so they refuse anyone else outright.
    pub fn require_admin(&self) -> Res<Uuid> {
        match self.role {
            Role::Admin => Ok(self.user_id),
            Role::User => Err(AppError::Forbidden(
                "Admin privileges are required".to_string(),
            )),
        }
    }
}

/// Generates a JWT for the given identity.
/// Tokens are normally minted by the authentication service; this is used
/// by tooling and tests that need a valid bearer token.
pub fn generate_jwt(user_id: Uuid, role: Role, config: &JwtConfig) -> Res<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.expiration_hours))
        .ok_or_else(|| AppError::Internal("Token expiration overflows".to_string()))?
        .timestamp();

    let claims = JwtClaims {
        user_id,
        role,
        exp: expiration as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(AppError::from)
}

/// Extracts claims object from JWT token.
/// Requires JWT secret.
pub fn validate_jwt(token: &str, secret: &str) -> Res<JwtClaims> {
    let token_data = jsonwebtoken::decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expiration_hours: 1,
        }
    }

    #[test]
    fn admin_claims_survive_signing() {
        let admin = Uuid::new_v4();
        let token = generate_jwt(admin, Role::Admin, &config()).unwrap();
        let claims = validate_jwt(&token, "test-secret").unwrap();
        assert_eq!(claims.require_admin().unwrap(), admin);
    }

    #[test]
    fn user_claims_are_not_admin() {
        let token = generate_jwt(Uuid::new_v4(), Role::User, &config()).unwrap();
        let claims = validate_jwt(&token, "test-secret").unwrap();
        assert!(matches!(claims.require_admin(), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt(Uuid::new_v4(), Role::User, &config()).unwrap();
        assert!(matches!(
            validate_jwt(&token, "other-secret"),
            Err(AppError::JWT(_))
        ));
    }
}
