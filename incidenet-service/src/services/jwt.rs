//! JWT issuance and validation.
//!
//! HS256 access tokens carrying the user id and role id; the role id claim
//! is what the permission checker consumes on every gated request.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::User;

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

/// Claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Email
    pub email: String,
    /// Role ID, consumed by the permission checker
    pub role_id: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Malformed subject claim")))
    }

    pub fn role_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.role_id)
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Malformed role claim")))
    }
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        }
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: user.user_id.to_string(),
            email: user.email.clone(),
            role_id: user.role_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Validate an access token and return its claims.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Expiry in seconds, for token responses.
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(&JwtConfig {
            secret: "unit-test-secret".to_string(),
            access_token_expiry_minutes: 15,
        })
    }

    fn sample_user() -> User {
        User::new(
            "ana@example.com".to_string(),
            "$argon2id$stub".to_string(),
            "Ana Torres".to_string(),
            Uuid::new_v4(),
        )
    }

    #[test]
    fn round_trip_preserves_identity_claims() {
        let jwt = service();
        let user = sample_user();
        let token = jwt.generate_access_token(&user).unwrap();
        let claims = jwt.validate_access_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user.user_id);
        assert_eq!(claims.role_id().unwrap(), user.role_id);
        assert_eq!(claims.email, user.email);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = service().generate_access_token(&sample_user()).unwrap();
        let other = JwtService::new(&JwtConfig {
            secret: "different-secret".to_string(),
            access_token_expiry_minutes: 15,
        });
        assert!(other.validate_access_token(&token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(service().validate_access_token("not-a-token").is_err());
    }
}
