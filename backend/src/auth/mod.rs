use std::sync::Arc;

use axum::http::{HeaderMap, header::AUTHORIZATION};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: Option<String>,
    pub exp: usize,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("JWT validation failed: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// HS256 secret for the optional bearer identity. `None` turns identity off.
#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    jwt_secret: Option<Arc<str>>,
}

impl AuthSettings {
    pub fn new(jwt_secret: Option<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.map(Arc::from),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.jwt_secret.is_some()
    }

    /// Never rejects: a missing or invalid token is logged and the request stays anonymous.
    pub fn subject_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let secret = match self.jwt_secret.as_deref() {
            Some(secret) => secret,
            None => {
                debug!("auth: no JWT secret configured, skipping bearer check");
                return None;
            }
        };

        let claims = bearer_token(headers)
            .ok_or(AuthError::MissingToken)
            .and_then(|token| validate_jwt(token, secret));

        match claims {
            Ok(claims) => {
                info!(subject = %claims.sub, "auth: bearer token accepted");
                Some(claims.sub)
            }
            Err(err) => {
                warn!(error = %err, "auth: request proceeds without identity");
                None
            }
        }
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<AccessClaims, AuthError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(jsonwebtoken::Algorithm::HS256);

    let token_data = decode::<AccessClaims>(token, &decoding_key, &validation)?;
    Ok(token_data.claims)
}
