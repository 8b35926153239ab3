//! Tamper-evident, self-contained tokens.
//!
//! Wire format: `base64url(json(claims)) "." base64url(hmac_sha256(secret, payload_part))`,
//! both parts unpadded. The MAC covers the *encoded* payload so verification
//! never has to decode untrusted bytes before the signature checks out.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Upper bound on an accepted token, checked before any decoding.
pub const MAX_TOKEN_LEN: usize = 4096;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret is empty")]
    EmptySecret,
    #[error("signing secret rejected by HMAC")]
    InvalidKey,
    #[error("failed to serialize token claims: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Signs and verifies tokens with a process-wide secret.
pub struct TokenSigner {
    secret: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[redacted]")
            .finish()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
        })
    }

    fn keyed(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::InvalidKey)
    }

    /// Serialize `claims` and return `payload.signature`.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(claims)?;
        let payload_part = URL_SAFE_NO_PAD.encode(payload);
        let mut mac = self.keyed()?;
        mac.update(payload_part.as_bytes());
        let sig_part = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload_part}.{sig_part}"))
    }

    /// Verify a token and decode its claims.
    ///
    /// Returns `None` for every failure (wrong shape, bad signature, bad
    /// payload) so callers cannot tell them apart.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        if token.len() > MAX_TOKEN_LEN {
            return None;
        }
        let (payload_part, sig_part) = split_token(token)?;

        let actual = URL_SAFE_NO_PAD.decode(sig_part).ok()?;
        let mut mac = self.keyed().ok()?;
        mac.update(payload_part.as_bytes());
        let expected = mac.finalize().into_bytes();
        if !bool::from(actual.as_slice().ct_eq(expected.as_slice())) {
            return None;
        }

        let payload = URL_SAFE_NO_PAD.decode(payload_part).ok()?;
        serde_json::from_slice(&payload).ok()
    }

    /// Hex-encoded HMAC of `message` under the signing secret.
    pub fn keyed_digest_hex(&self, message: &[u8]) -> Result<String, TokenError> {
        let mut mac = self.keyed()?;
        mac.update(message);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn split_token(token: &str) -> Option<(&str, &str)> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(payload), Some(sig), None) if !payload.is_empty() && !sig.is_empty() => {
            Some((payload, sig))
        }
        _ => None,
    }
}
