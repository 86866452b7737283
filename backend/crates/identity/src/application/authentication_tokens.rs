//! Authentication Token Store
//!
//! Bearer tokens are re-verified on every request and never consumed.
//! Expired rows stay until cleanup; expiry is enforced at read time.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::config::IdentityConfig;
use crate::domain::entity::{token::AuthenticationToken, user::User};
use crate::domain::repository::{AuthenticationTokenRepository, UserRepository};
use crate::domain::services::TokenCodec;
use crate::domain::value_object::user_id::UserId;
use crate::error::{IdentityError, IdentityResult};

pub struct AuthenticationTokenStore<R>
where
    R: AuthenticationTokenRepository + UserRepository,
{
    repo: Arc<R>,
    config: Arc<IdentityConfig>,
    clock: Arc<dyn Clock>,
    codec: TokenCodec,
}

impl<R> AuthenticationTokenStore<R>
where
    R: AuthenticationTokenRepository + UserRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<IdentityConfig>, clock: Arc<dyn Clock>) -> Self {
        let codec = TokenCodec::new(config.token_bytes);
        Self {
            repo,
            config,
            clock,
            codec,
        }
    }

    /// Issue a bearer token for `user_id`. The plaintext is only in the result.
    pub async fn issue(&self, user_id: &UserId) -> IdentityResult<AuthenticationToken> {
        if user_id.is_nil() {
            return Err(IdentityError::validation("user_id", "must be provided"));
        }

        let token = self
            .codec
            .generate(self.config.authentication_token_ttl, self.clock.now())?;
        let token = AuthenticationToken {
            token,
            user_id: *user_id,
        };

        self.repo.insert_authentication_token(&token).await?;

        tracing::debug!(
            user_id = %user_id,
            expiry = %token.token.expiry(),
            "Authentication token issued"
        );

        Ok(token)
    }

    /// Owner of a presented token.
    ///
    /// `NotFound` for an unknown or malformed token, `Expired` once
    /// `now >= expiry`.
    pub async fn resolve_user(&self, plaintext: &str) -> IdentityResult<User> {
        if !self.codec.is_well_formed(plaintext) {
            return Err(IdentityError::NotFound);
        }

        let hash = TokenCodec::hash(plaintext);
        let (user, expiry) = self
            .repo
            .find_by_authentication_token(&hash)
            .await?
            .ok_or(IdentityError::NotFound)?;

        if self.clock.now() >= expiry {
            return Err(IdentityError::Expired);
        }

        Ok(user)
    }

    /// Delete every bearer token of `user_id`.
    pub async fn purge(&self, user_id: &UserId) -> IdentityResult<u64> {
        let deleted = self
            .repo
            .delete_authentication_tokens_for_user(user_id)
            .await?;

        tracing::debug!(user_id = %user_id, deleted, "Authentication tokens purged");

        Ok(deleted)
    }
}
