//! Password-reset tokens: one-time, short-lived secrets.
//!
//! The plain token leaves the server exactly once (to the delivery channel);
//! only its SHA-256 digest is stored. No signing key is involved: the token's
//! own 32 bytes of entropy carry the proof.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// How long a reset token stays valid.
const RESET_TOKEN_TTL_MINUTES: i64 = 10;

pub struct ResetToken {
    /// Hex-encoded random token, handed to the delivery channel.
    pub plain: String,
    /// SHA-256 digest of `plain`, the only form persisted.
    pub hashed: String,
    pub expires_at: DateTime<Utc>,
}

pub fn generate() -> ResetToken {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let plain = hex::encode(bytes);
    let hashed = hash_token(&plain);
    let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
    ResetToken {
        plain,
        hashed,
        expires_at,
    }
}

/// Digest a raw token the same way `generate` does, for lookup and matching.
pub fn hash_token(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_token_is_never_the_stored_form() {
        let token = generate();
        assert_ne!(token.plain, token.hashed);
        assert_eq!(token.plain.len(), 64); // 32 bytes hex
        assert_eq!(token.hashed.len(), 64); // sha256 hex
    }

    #[test]
    fn candidate_digest_matches_stored_digest() {
        let token = generate();
        assert_eq!(hash_token(&token.plain), token.hashed);
        assert_ne!(hash_token("some-other-token"), token.hashed);
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(generate().plain, generate().plain);
    }

    #[test]
    fn expiry_is_about_ten_minutes_out() {
        let token = generate();
        let delta = token.expires_at - Utc::now();
        assert!(delta <= Duration::minutes(10));
        assert!(delta > Duration::minutes(9));
    }
}
