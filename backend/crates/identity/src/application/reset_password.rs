//! Reset Password Use Case
//!
//! Verify a password-reset token, store the new password, then invalidate
//! every outstanding token of the account, bearer tokens included.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::authentication_tokens::AuthenticationTokenStore;
use crate::application::config::IdentityConfig;
use crate::application::sign_up::verification_error;
use crate::application::users::UserRecordStore;
use crate::application::verification_tokens::VerificationTokenStore;
use crate::domain::entity::user::User;
use crate::domain::repository::IdentityRepository;
use crate::domain::value_object::{
    email::Email,
    token_scope::TokenScope,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{IdentityError, IdentityResult};

pub const PASSWORD_RESET_MESSAGE: &str = "your password was successfully reset";
const RESET_TOKEN_EXPIRED_MESSAGE: &str = "Expired token. Please request a new password reset.";

pub struct ResetPasswordInput {
    pub email: String,
    pub password: String,
    pub token: String,
}

pub struct ResetPasswordUseCase<R>
where
    R: IdentityRepository,
{
    users: UserRecordStore<R>,
    verification: VerificationTokenStore<R>,
    authentication: AuthenticationTokenStore<R>,
}

impl<R> ResetPasswordUseCase<R>
where
    R: IdentityRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<IdentityConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users: UserRecordStore::new(repo.clone()),
            verification: VerificationTokenStore::new(repo.clone(), config.clone(), clock.clone()),
            authentication: AuthenticationTokenStore::new(repo, config, clock),
        }
    }

    pub async fn execute(&self, input: ResetPasswordInput) -> IdentityResult<User> {
        let email = Email::new(input.email)?;
        let password = RawPassword::new(input.password)?;

        self.verification
            .verify(&input.token, TokenScope::PasswordReset, &email, None)
            .await
            .map_err(|e| verification_error(e, RESET_TOKEN_EXPIRED_MESSAGE))?;

        // The account may have been removed since the token was issued.
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(IdentityError::VerificationTokenInvalid)?;

        user.set_password_hash(UserPassword::hash(password).await?);
        self.users.update(&mut user).await?;

        self.verification.purge_by_email(&email).await?;
        self.verification.purge_by_user_id(&user.id).await?;
        self.authentication.purge(&user.id).await?;

        tracing::info!(user_id = %user.id, "Password reset");

        Ok(user)
    }
}
