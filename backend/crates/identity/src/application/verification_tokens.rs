//! Verification Token Store
//!
//! Scope, email and the optional user id form the lookup key, so a token
//! never validates outside the flow it was issued for. `verify` has no side
//! effects; callers purge after a terminal use.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::config::IdentityConfig;
use crate::domain::entity::token::VerificationToken;
use crate::domain::repository::VerificationTokenRepository;
use crate::domain::services::TokenCodec;
use crate::domain::value_object::{email::Email, token_scope::TokenScope, user_id::UserId};
use crate::error::{IdentityError, IdentityResult};

pub struct VerificationTokenStore<R>
where
    R: VerificationTokenRepository,
{
    repo: Arc<R>,
    config: Arc<IdentityConfig>,
    clock: Arc<dyn Clock>,
    codec: TokenCodec,
}

impl<R> VerificationTokenStore<R>
where
    R: VerificationTokenRepository,
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

    pub async fn issue(
        &self,
        scope: TokenScope,
        email: &Email,
        user_id: Option<&UserId>,
    ) -> IdentityResult<VerificationToken> {
        let token = self
            .codec
            .generate(self.config.verification_token_ttl, self.clock.now())?;
        let token = VerificationToken {
            token,
            scope,
            email: email.clone(),
            user_id: user_id.copied(),
        };

        self.repo.insert_verification_token(&token).await?;

        tracing::debug!(%scope, bound = user_id.is_some(), "Verification token issued");

        Ok(token)
    }

    /// Whether an unexpired token already exists for the key.
    ///
    /// Advisory only: two concurrent callers can both see `false`.
    pub async fn exists(
        &self,
        scope: TokenScope,
        email: &Email,
        user_id: Option<&UserId>,
    ) -> IdentityResult<bool> {
        self.repo
            .verification_token_exists(scope, email, user_id, self.clock.now())
            .await
    }

    /// `NotFound` if nothing matches the full key, `Expired` once
    /// `now >= expiry`. A malformed token fails validation first.
    pub async fn verify(
        &self,
        plaintext: &str,
        scope: TokenScope,
        email: &Email,
        user_id: Option<&UserId>,
    ) -> IdentityResult<()> {
        if plaintext.is_empty() {
            return Err(IdentityError::validation("token", "must be provided"));
        }
        if !self.codec.is_well_formed(plaintext) {
            return Err(IdentityError::validation("token", "is not a valid token"));
        }

        let hash = TokenCodec::hash(plaintext);
        let expiry = self
            .repo
            .find_verification_token_expiry(&hash, scope, email, user_id)
            .await?
            .ok_or(IdentityError::NotFound)?;

        if self.clock.now() >= expiry {
            return Err(IdentityError::Expired);
        }

        Ok(())
    }

    pub async fn purge_by_email(&self, email: &Email) -> IdentityResult<u64> {
        let deleted = self.repo.delete_verification_tokens_for_email(email).await?;
        tracing::debug!(deleted, "Verification tokens purged by email");
        Ok(deleted)
    }

    pub async fn purge_by_user_id(&self, user_id: &UserId) -> IdentityResult<u64> {
        let deleted = self.repo.delete_verification_tokens_for_user(user_id).await?;
        tracing::debug!(user_id = %user_id, deleted, "Verification tokens purged by user");
        Ok(deleted)
    }
}
