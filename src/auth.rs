//! # Auth — Bearer Token Verification
//!
//! Tokens are HS256 JWTs issued by the identity provider. The only claims we
//! read are `sub` (the user id) and a boolean `admin` flag.
//!
//! [`init`] installs the process-wide configuration. It must run once in
//! `main`, before the HTTP listener or the job scheduler start; later calls
//! are ignored and return `false`. With no secret configured, tokens are
//! decoded without signature validation, which is only suitable for local
//! development.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub audience: Option<String>,
}

static AUTH: OnceLock<AuthConfig> = OnceLock::new();

/// Install the auth configuration. Returns `true` on the first call only.
pub fn init(config: AuthConfig) -> bool {
    if config.jwt_secret.is_none() {
        warn!("AUTH_JWT_SECRET not set, bearer tokens will not be signature-checked");
    }
    AUTH.set(config).is_ok()
}

pub fn is_initialized() -> bool {
    AUTH.get().is_some()
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    admin: bool,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: String,
    pub is_admin: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth is not initialized")]
    NotInitialized,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Verify a bearer token against the installed configuration.
pub fn verify_token(token: &str) -> Result<Principal, AuthError> {
    let config = AUTH.get().ok_or(AuthError::NotInitialized)?;
    verify_with(config, token)
}

pub fn verify_with(config: &AuthConfig, token: &str) -> Result<Principal, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    match &config.audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }

    let data = match &config.jwt_secret {
        Some(secret) => decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )?,
        None => {
            validation.insecure_disable_signature_validation();
            validation.validate_exp = false;
            validation.required_spec_claims.clear();
            decode::<Claims>(token, &DecodingKey::from_secret(b""), &validation)?
        }
    };

    Ok(Principal {
        user_id: data.claims.sub,
        is_admin: data.claims.admin,
    })
}
