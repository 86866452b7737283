//! Sign Up Use Case
//!
//! Completes registration: verify the registration token, purge every token
//! for the address, create the user.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::config::IdentityConfig;
use crate::application::users::UserRecordStore;
use crate::application::verification_tokens::VerificationTokenStore;
use crate::domain::entity::user::User;
use crate::domain::repository::IdentityRepository;
use crate::domain::value_object::{
    email::Email, token_scope::TokenScope, user_password::RawPassword,
};
use crate::error::{IdentityError, IdentityResult};

pub const SIGNUP_TOKEN_EXPIRED_MESSAGE: &str = "Expired token. Please signup again.";

pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub token: String,
}

pub struct SignUpUseCase<R>
where
    R: IdentityRepository,
{
    users: UserRecordStore<R>,
    tokens: VerificationTokenStore<R>,
}

impl<R> SignUpUseCase<R>
where
    R: IdentityRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<IdentityConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users: UserRecordStore::new(repo.clone()),
            tokens: VerificationTokenStore::new(repo, config, clock),
        }
    }

    pub async fn execute(&self, input: SignUpInput) -> IdentityResult<User> {
        let email = Email::new(input.email)?;
        let password = RawPassword::new(input.password)?;

        self.tokens
            .verify(&input.token, TokenScope::Registration, &email, None)
            .await
            .map_err(|e| verification_error(e, SIGNUP_TOKEN_EXPIRED_MESSAGE))?;

        self.tokens.purge_by_email(&email).await?;

        self.users.create(&email, password).await
    }
}

/// Store outcomes of `verify` as the client should see them
pub(crate) fn verification_error(
    err: IdentityError,
    expired_message: &'static str,
) -> IdentityError {
    match err {
        IdentityError::NotFound => IdentityError::VerificationTokenInvalid,
        IdentityError::Expired => IdentityError::VerificationTokenExpired(expired_message),
        other => other,
    }
}
