//! Token Codec
//!
//! Random secret -> URL-safe base64 plaintext -> SHA-256 digest.

use chrono::{DateTime, Duration, Utc};
use platform::crypto::{from_base64_url, random_bytes, sha256, to_base64_url};

use crate::domain::entity::token::Token;
use crate::domain::value_object::token_hash::TokenHash;
use crate::error::IdentityResult;

/// Entropy per token
pub const DEFAULT_TOKEN_BYTES: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct TokenCodec {
    entropy_bytes: usize,
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_BYTES)
    }
}

impl TokenCodec {
    pub fn new(entropy_bytes: usize) -> Self {
        Self { entropy_bytes }
    }

    /// Fails only if the OS entropy source is unavailable.
    pub fn generate(&self, ttl: Duration, now: DateTime<Utc>) -> IdentityResult<Token> {
        let plaintext = to_base64_url(&random_bytes(self.entropy_bytes)?);
        let hash = Self::hash(&plaintext);
        Ok(Token::new(plaintext, hash, now + ttl))
    }

    /// Whether `plaintext` could have come from this codec. Lets callers
    /// reject garbage without a store round-trip.
    pub fn is_well_formed(&self, plaintext: &str) -> bool {
        from_base64_url(plaintext).is_ok_and(|bytes| bytes.len() == self.entropy_bytes)
    }

    /// Digest of the plaintext as presented by the client
    pub fn hash(plaintext: &str) -> TokenHash {
        TokenHash::from_bytes(sha256(plaintext.as_bytes()))
    }
}
