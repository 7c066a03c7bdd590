use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::{debug, instrument};

use super::types::{AuthClaims, AuthenticatedUser};
use crate::shared::AppError;

/// Verifies handshake bearer tokens issued by the external account service.
///
/// The signaling core never issues tokens; it only resolves them to a user id.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AppError>;
}

/// HS256 verifier sharing a signing secret with the token-issuing service
#[derive(Clone)]
pub struct JwtTokenVerifier {
    secret: String,
}

impl JwtTokenVerifier {
    pub fn new() -> Self {
        Self {
            secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "your-secret-key-change-in-production".to_string()),
        }
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl Default for JwtTokenVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    #[instrument(skip(self, token))]
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        debug!("Decoding and validating handshake token");

        decode::<AuthClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| {
            debug!(
                user_id = %data.claims.sub,
                exp = data.claims.exp,
                "Handshake token verified"
            );
            AuthenticatedUser {
                user_id: data.claims.sub,
            }
        })
        .map_err(|e| {
            debug!(error = %e, "Failed to verify handshake token");
            AppError::Authentication(e.to_string())
        })
    }
}
