//! Credential token claims and token exchange types

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Rights granted to a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Rights {
    Read = 1,
    Write = 2,
}

/// JWT claims carried by a credential token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub rights: Rights,
    pub exp: i64,
    pub iat: i64,
}

impl TokenClaims {
    pub fn new(client_id: &str, rights: Rights, expiration_hours: u64) -> Self {
        let now = Utc::now();
        let hours = i64::try_from(expiration_hours).unwrap_or(i64::MAX / 3600);
        Self {
            sub: client_id.to_string(),
            rights,
            iat: now.timestamp(),
            exp: (now + Duration::hours(hours)).timestamp(),
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn require_write_catalog(&self) -> Result<(), AppError> {
        if self.rights >= Rights::Write {
            Ok(())
        } else {
            Err(AppError::Authorization("Insufficient rights to modify the catalog".to_string()))
        }
    }
}

/// Token exchange request
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub client_id: String,
    pub client_secret: String,
}

/// Token exchange response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: i64,
}
