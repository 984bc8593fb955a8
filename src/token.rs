//! Signed tokens for the region-fallback hop
//!
//! A token carries the link, session and country that `/go` resolved so
//! that `/fallback` can act on them without trusting query parameters.
//! Format: `base64url(json).base64url(hmac_sha256)`.

use base64::prelude::*;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token format")]
    Format,
    #[error("token signature verification failed")]
    Signature,
    #[error("token has expired")]
    Expired,
    #[error("failed to encode token: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackClaims {
    pub link_id: i64,
    pub session_id: String,
    pub country: String,
    pub issued_at: i64,
}

/// Issues and verifies fallback tokens with a process-wide key
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
    ttl_secs: i64,
}

impl TokenSigner {
    /// Without a secret a random key is used, so tokens do not survive restarts
    pub fn new(secret: Option<&str>, ttl_secs: i64) -> Self {
        let key = match secret {
            Some(s) => s.as_bytes().to_vec(),
            None => {
                tracing::warn!(
                    "FALLBACK_TOKEN_SECRET not set, using a random key; fallback tokens will not survive restarts"
                );
                rand::random::<[u8; 32]>().to_vec()
            }
        };

        Self {
            key,
            ttl_secs: ttl_secs.max(1),
        }
    }

    fn mac(&self, payload: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|e| TokenError::Encode(e.to_string()))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    pub fn issue(&self, claims: &FallbackClaims) -> Result<String, TokenError> {
        let json = serde_json::to_vec(claims).map_err(|e| TokenError::Encode(e.to_string()))?;
        let payload = BASE64_URL_SAFE_NO_PAD.encode(json);
        let signature = BASE64_URL_SAFE_NO_PAD.encode(self.mac(payload.as_bytes())?);
        Ok(format!("{}.{}", payload, signature))
    }

    /// Verify a token at time `now` (unix seconds)
    pub fn verify_at(&self, token: &str, now: i64) -> Result<FallbackClaims, TokenError> {
        let (payload, signature_b64) = token.split_once('.').ok_or(TokenError::Format)?;
        if payload.is_empty() || signature_b64.contains('.') {
            return Err(TokenError::Format);
        }

        let provided = BASE64_URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Format)?;
        let expected = self.mac(payload.as_bytes())?;

        if !bool::from(expected.ct_eq(&provided)) {
            return Err(TokenError::Signature);
        }

        let json = BASE64_URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Format)?;
        let claims: FallbackClaims =
            serde_json::from_slice(&json).map_err(|_| TokenError::Format)?;

        if now - claims.issued_at > self.ttl_secs || claims.issued_at - now > 60 {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    pub fn verify(&self, token: &str) -> Result<FallbackClaims, TokenError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(issued_at: i64) -> FallbackClaims {
        FallbackClaims {
            link_id: 42,
            session_id: "sess_1_abc".to_string(),
            country: "Canada".to_string(),
            issued_at,
        }
    }

    #[test]
    fn test_token_issue_and_verify() {
        let signer = TokenSigner::new(Some("test_secret_key_for_hmac_signing"), 900);
        let token = signer.issue(&claims(1_000)).unwrap();
        assert_eq!(signer.verify_at(&token, 1_100).unwrap(), claims(1_000));
    }

    #[test]
    fn test_token_tampering_detection() {
        let signer = TokenSigner::new(Some("test_secret_key_for_hmac_signing"), 900);
        let token = signer.issue(&claims(1_000)).unwrap();

        let (_, signature) = token.split_once('.').unwrap();
        let mut forged = claims(1_000);
        forged.country = "United States".to_string();
        let forged_payload = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());

        assert_eq!(
            signer.verify_at(&format!("{forged_payload}.{signature}"), 1_100),
            Err(TokenError::Signature)
        );
    }

    #[test]
    fn test_token_from_another_key_is_rejected() {
        let a = TokenSigner::new(Some("key-a"), 900);
        let b = TokenSigner::new(Some("key-b"), 900);
        let token = a.issue(&claims(1_000)).unwrap();
        assert_eq!(b.verify_at(&token, 1_000), Err(TokenError::Signature));
    }

    #[test]
    fn test_token_expiry() {
        let signer = TokenSigner::new(Some("secret"), 60);
        let token = signer.issue(&claims(1_000)).unwrap();
        assert!(signer.verify_at(&token, 1_060).is_ok());
        assert_eq!(signer.verify_at(&token, 1_061), Err(TokenError::Expired));
        // Issued far in the future
        assert_eq!(signer.verify_at(&token, 800), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_invalid_format() {
        let signer = TokenSigner::new(Some("secret"), 60);
        assert_eq!(signer.verify_at("invalid", 0), Err(TokenError::Format));
        assert_eq!(signer.verify_at("a.b.c", 0), Err(TokenError::Format));
        assert_eq!(signer.verify_at(".abc", 0), Err(TokenError::Format));
    }
}
