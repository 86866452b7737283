//! Token Entities
//!
//! The plaintext exists only in the value returned at issuance. Stores see
//! the hash.

use chrono::{DateTime, Utc};
use std::fmt;
use zeroize::Zeroize;

use crate::domain::value_object::{
    email::Email, token_hash::TokenHash, token_scope::TokenScope, user_id::UserId,
};

/// A freshly generated token
pub struct Token {
    plaintext: String,
    hash: TokenHash,
    expiry: DateTime<Utc>,
}

impl Token {
    pub(crate) fn new(plaintext: String, hash: TokenHash, expiry: DateTime<Utc>) -> Self {
        Self {
            plaintext,
            hash,
            expiry,
        }
    }

    /// The secret handed to the client. Never persist or log it.
    pub fn plaintext(&self) -> &str {
        &self.plaintext
    }

    pub fn hash(&self) -> &TokenHash {
        &self.hash
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        self.plaintext.zeroize();
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"[REDACTED]")
            .field("hash", &self.hash)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Bearer token bound to a user
#[derive(Debug)]
pub struct AuthenticationToken {
    pub token: Token,
    pub user_id: UserId,
}

/// One-time token proving control of `email` for `scope`
#[derive(Debug)]
pub struct VerificationToken {
    pub token: Token,
    pub scope: TokenScope,
    pub email: Email,
    /// Present for account-bound flows such as email change
    pub user_id: Option<UserId>,
}
