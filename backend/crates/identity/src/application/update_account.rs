//! Update Account Use Case
//!
//! Email change needs an email-change token bound to the caller. Password
//! change needs only an authenticated caller. Both land in one optimistic
//! write.

use std::sync::Arc;

use platform::clock::Clock;

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

const EMAIL_CHANGE_TOKEN_EXPIRED_MESSAGE: &str = "Expired token";

#[derive(Default)]
pub struct UpdateAccountInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

pub struct UpdateAccountUseCase<R>
where
    R: IdentityRepository,
{
    users: UserRecordStore<R>,
    tokens: VerificationTokenStore<R>,
}

impl<R> UpdateAccountUseCase<R>
where
    R: IdentityRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<IdentityConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users: UserRecordStore::new(repo.clone()),
            tokens: VerificationTokenStore::new(repo, config, clock),
        }
    }

    /// `user` is the authenticated caller as read at the start of the request.
    pub async fn execute(&self, mut user: User, input: UpdateAccountInput) -> IdentityResult<User> {
        let email = input.email.map(Email::new).transpose()?;
        let password = input.password.map(RawPassword::new).transpose()?;

        if let Some(email) = email {
            let token = input
                .token
                .as_deref()
                .ok_or_else(|| {
                    IdentityError::validation("token", "must be provided to change email")
                })?;

            self.tokens
                .verify(token, TokenScope::EmailChange, &email, Some(&user.id))
                .await
                .map_err(|e| verification_error(e, EMAIL_CHANGE_TOKEN_EXPIRED_MESSAGE))?;

            self.tokens.purge_by_user_id(&user.id).await?;
            user.set_email(email);
        }

        if let Some(password) = password {
            user.set_password_hash(UserPassword::hash(password).await?);
        }

        self.users.update(&mut user).await?;

        Ok(user)
    }
}
