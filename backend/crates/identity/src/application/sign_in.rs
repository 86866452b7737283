//! Sign In Use Case
//!
//! Exchanges email and password for a bearer token.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::authentication_tokens::AuthenticationTokenStore;
use crate::application::config::IdentityConfig;
use crate::application::users::UserRecordStore;
use crate::domain::entity::token::AuthenticationToken;
use crate::domain::repository::IdentityRepository;
use crate::domain::value_object::{email::Email, user_password::RawPassword};
use crate::error::IdentityResult;

pub struct SignInInput {
    pub email: String,
    pub password: String,
}

pub struct SignInUseCase<R>
where
    R: IdentityRepository,
{
    users: UserRecordStore<R>,
    tokens: AuthenticationTokenStore<R>,
}

impl<R> SignInUseCase<R>
where
    R: IdentityRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<IdentityConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users: UserRecordStore::new(repo.clone()),
            tokens: AuthenticationTokenStore::new(repo, config, clock),
        }
    }

    pub async fn execute(&self, input: SignInInput) -> IdentityResult<AuthenticationToken> {
        let email = Email::new(input.email)?;
        // No length policy here: any mismatch is `InvalidCredentials`.
        let password = RawPassword::candidate(input.password);

        let user = self.users.find_by_credentials(&email, password).await?;
        let token = self.tokens.issue(&user.id).await?;

        tracing::info!(user_id = %user.id, "User signed in");

        Ok(token)
    }
}
