//! Request Verification Use Case
//!
//! Issues a scoped verification token and mails it from a background task.
//! The caller always gets the same answer whether or not a token was sent,
//! so these flows cannot be used to discover which emails are registered.

use std::sync::Arc;

use platform::background::BackgroundTasks;
use platform::clock::Clock;
use platform::mail::MailTransport;
use serde_json::json;

use crate::application::config::IdentityConfig;
use crate::application::users::UserRecordStore;
use crate::application::verification_tokens::VerificationTokenStore;
use crate::domain::entity::user::User;
use crate::domain::repository::IdentityRepository;
use crate::domain::value_object::{email::Email, token_scope::TokenScope};
use crate::error::IdentityResult;

pub const VERIFICATION_SENT_MESSAGE: &str =
    "A verification email has been sent. Please check your inbox.";

/// Whether a token was actually issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Issued,
    Suppressed,
}

pub struct RequestVerificationUseCase<R, M>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    users: UserRecordStore<R>,
    tokens: VerificationTokenStore<R>,
    mailer: Arc<M>,
    tasks: BackgroundTasks,
}

impl<R, M> RequestVerificationUseCase<R, M>
where
    R: IdentityRepository,
    M: MailTransport + Send + Sync + 'static,
{
    pub fn new(
        repo: Arc<R>,
        mailer: Arc<M>,
        tasks: BackgroundTasks,
        config: Arc<IdentityConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users: UserRecordStore::new(repo.clone()),
            tokens: VerificationTokenStore::new(repo, config, clock),
            mailer,
            tasks,
        }
    }

    /// Only for addresses with no account yet.
    pub async fn registration(&self, email: &Email) -> IdentityResult<VerificationOutcome> {
        if self.users.exists_with_email(email).await? {
            return Ok(VerificationOutcome::Suppressed);
        }
        self.issue_once(TokenScope::Registration, email, None).await
    }

    /// Only for addresses that belong to an account.
    pub async fn password_reset(&self, email: &Email) -> IdentityResult<VerificationOutcome> {
        if !self.users.exists_with_email(email).await? {
            return Ok(VerificationOutcome::Suppressed);
        }
        self.issue_once(TokenScope::PasswordReset, email, None).await
    }

    /// Token bound to `user` for moving to `new_email`, if that address is free.
    pub async fn email_change(
        &self,
        user: &User,
        new_email: &Email,
    ) -> IdentityResult<VerificationOutcome> {
        if self.users.exists_with_email(new_email).await? {
            return Ok(VerificationOutcome::Suppressed);
        }
        self.issue_once(TokenScope::EmailChange, new_email, Some(user))
            .await
    }

    async fn issue_once(
        &self,
        scope: TokenScope,
        email: &Email,
        user: Option<&User>,
    ) -> IdentityResult<VerificationOutcome> {
        let user_id = user.map(|u| &u.id);

        if self.tokens.exists(scope, email, user_id).await? {
            tracing::debug!(%scope, "Verification already pending, not resending");
            return Ok(VerificationOutcome::Suppressed);
        }

        let token = self.tokens.issue(scope, email, user_id).await?;

        let mailer = self.mailer.clone();
        let recipient = email.as_str().to_owned();
        let data = json!({ "token": token.token.plaintext() });
        self.tasks.run("verification-mail", async move {
            mailer
                .deliver(&recipient, scope.mail_template(), data)
                .await
        });

        tracing::info!(%scope, "Verification token issued");

        Ok(VerificationOutcome::Issued)
    }
}
