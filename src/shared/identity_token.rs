use anyhow::Context;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(rename = "sub")]
    pub player_id: String,
    pub name: String,
    #[serde(rename = "exp")]
    pub expires_at_ms: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not in payload.signature form")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token claims could not be decoded")]
    BadClaims,
    #[error("token expired at {0}")]
    Expired(i64),
}

pub fn sign_identity_token(claims: &IdentityClaims, secret: &str) -> anyhow::Result<String> {
    let payload = serde_json::to_vec(claims).context("failed to serialize identity claims")?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .context("failed to initialize identity token signer")?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{payload_b64}.{signature_b64}"))
}

/// Checks the signature before decoding anything, then the expiry against `now_ms`.
pub fn verify_identity_token(
    token: &str,
    secret: &str,
    now_ms: i64,
) -> Result<IdentityClaims, TokenError> {
    let mut parts = token.trim().split('.');
    let (Some(payload_b64), Some(signature_b64), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };
    if payload_b64.is_empty() || signature_b64.is_empty() {
        return Err(TokenError::Malformed);
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::Malformed)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::BadSignature)?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| TokenError::BadClaims)?;
    let claims: IdentityClaims =
        serde_json::from_slice(&payload).map_err(|_| TokenError::BadClaims)?;
    if claims.expires_at_ms <= now_ms {
        return Err(TokenError::Expired(claims.expires_at_ms));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(expires_at_ms: i64) -> IdentityClaims {
        IdentityClaims {
            player_id: "player-1".to_string(),
            name: "Woodcutter".to_string(),
            expires_at_ms,
        }
    }

    #[test]
    fn sign_identity_token_returns_two_part_token() {
        let token = sign_identity_token(&claims(12345), "secret").expect("token should be signed");
        let mut parts = token.split('.');
        assert!(parts.next().is_some());
        assert!(parts.next().is_some());
        assert!(parts.next().is_none());
    }

    #[test]
    fn verify_accepts_fresh_token() {
        let token = sign_identity_token(&claims(10_000), "secret").expect("token");
        let verified = verify_identity_token(&token, "secret", 9_999).expect("valid");
        assert_eq!(verified.player_id, "player-1");
        assert_eq!(verified.name, "Woodcutter");
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let token = sign_identity_token(&claims(10_000), "secret").expect("token");
        assert_eq!(
            verify_identity_token(&token, "other", 0).unwrap_err(),
            TokenError::BadSignature
        );
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let token = sign_identity_token(&claims(10_000), "secret").expect("token");
        let (_, signature) = token.split_once('.').expect("two parts");
        let forged_claims = IdentityClaims {
            player_id: "someone-else".to_string(),
            ..claims(10_000)
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{forged_payload}.{signature}");
        assert_eq!(
            verify_identity_token(&forged, "secret", 0).unwrap_err(),
            TokenError::BadSignature
        );
    }

    #[test]
    fn verify_rejects_expired_token() {
        let token = sign_identity_token(&claims(10_000), "secret").expect("token");
        assert_eq!(
            verify_identity_token(&token, "secret", 10_000).unwrap_err(),
            TokenError::Expired(10_000)
        );
    }

    #[test]
    fn verify_rejects_garbage() {
        assert_eq!(verify_identity_token("", "secret", 0).unwrap_err(), TokenError::Malformed);
        assert_eq!(
            verify_identity_token("a.b.c", "secret", 0).unwrap_err(),
            TokenError::Malformed
        );
        assert_eq!(
            verify_identity_token("no-dot", "secret", 0).unwrap_err(),
            TokenError::Malformed
        );
    }
}
