use crate::app::time::now_millis;
use crate::game::types::Identity;
use crate::shared::identity_token::{verify_identity_token, TokenError};
use crate::shared::names::sanitize_display_name;
use axum::http::{header, HeaderMap};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no credential presented")]
    MissingCredential,
    #[error(transparent)]
    InvalidToken(#[from] TokenError),
}

/// Resolves a bearer credential into an [`Identity`] before the upgrade completes.
#[derive(Debug, Clone)]
pub struct IdentityGate {
    secret: String,
}

impl IdentityGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        self.verify_at(token, now_millis())
    }

    pub fn verify_at(&self, token: Option<&str>, now_ms: i64) -> Result<Identity, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingCredential)?;
        let claims = verify_identity_token(token, &self.secret, now_ms)?;
        let player_id = claims.player_id.trim().to_string();
        if player_id.is_empty() {
            return Err(AuthError::InvalidToken(TokenError::BadClaims));
        }
        Ok(Identity {
            player_id,
            display_name: sanitize_display_name(&claims.name),
        })
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

/// Prefers the `token` query parameter, then `Authorization: Bearer`.
pub fn credential_from_request<'a>(
    query_token: Option<&'a str>,
    headers: &'a HeaderMap,
) -> Option<&'a str> {
    if let Some(token) = query_token.filter(|token| !token.trim().is_empty()) {
        return Some(token);
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}
