use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use super::policy::AccessPolicy;
use crate::models::AuthUser;

/// Claims of the access token issued by the hosted auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Verifies provider-issued bearer tokens. This service never issues tokens.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    policy: AccessPolicy,
}

impl JwtVerifier {
    pub fn new(secret: &Secret<String>, policy: AccessPolicy) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Provider tokens carry an "authenticated" audience we do not pin.
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
            policy,
        }
    }

    /// Validate the token and resolve the caller's role.
    pub fn authenticate(&self, token: &str) -> Result<AuthUser, AppError> {
        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)?.claims;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            AppError::Unauthorized(anyhow::anyhow!("Token subject is not a user id"))
        })?;

        let role = self.policy.resolve_role(claims.email.as_deref());

        Ok(AuthUser {
            user_id,
            email: claims.email,
            role,
        })
    }
}
