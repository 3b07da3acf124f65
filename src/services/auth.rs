//! Credential token issuance and verification

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::credential::{TokenClaims, TokenRequest, TokenResponse},
};

/// Hash a client secret into the PHC string stored in configuration
pub fn hash_secret(secret: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash secret: {}", e)))
}

fn verify_secret(secret: &str, secret_hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(secret_hash)
        .map_err(|e| AppError::Internal(format!("Invalid secret hash in configuration: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Exchange a client credential for a signed token
    pub async fn issue_token(&self, request: &TokenRequest) -> AppResult<TokenResponse> {
        let invalid = || AppError::Authentication("Invalid client credentials".to_string());

        let client = self
            .config
            .clients
            .iter()
            .find(|c| c.client_id == request.client_id)
            .ok_or_else(invalid)?;

        // Argon2 verification is CPU bound
        let secret = request.client_secret.clone();
        let secret_hash = client.secret_hash.clone();
        let verified = tokio::task::spawn_blocking(move || verify_secret(&secret, &secret_hash))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;
        if !verified {
            tracing::warn!(client_id = %client.client_id, "Rejected client secret");
            return Err(invalid());
        }

        let claims = TokenClaims::new(
            &client.client_id,
            client.rights,
            self.config.jwt_expiration_hours,
        );
        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))?;

        tracing::info!(client_id = %client.client_id, "Issued credential token");
        Ok(TokenResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_at: claims.exp,
        })
    }

    pub fn verify_token(&self, token: &str) -> AppResult<TokenClaims> {
        TokenClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))
    }
}
