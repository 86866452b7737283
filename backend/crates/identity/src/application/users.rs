//! User Record Store

use std::sync::Arc;

use crate::domain::entity::user::User;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{
    email::Email,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{IdentityError, IdentityResult};

pub struct UserRecordStore<R>
where
    R: UserRepository,
{
    repo: Arc<R>,
}

impl<R> UserRecordStore<R>
where
    R: UserRepository,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Hash `password` and insert. `DuplicateEmail` if the address is taken.
    pub async fn create(&self, email: &Email, password: RawPassword) -> IdentityResult<User> {
        let password_hash = UserPassword::hash(password).await?;
        let user = self.repo.insert(email, &password_hash).await?;

        tracing::info!(user_id = %user.id, "User created");

        Ok(user)
    }

    /// `InvalidCredentials` for an unknown email and for a wrong password alike.
    pub async fn find_by_credentials(
        &self,
        email: &Email,
        password: RawPassword,
    ) -> IdentityResult<User> {
        let user = self
            .repo
            .find_by_email(email)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        if !user.password_hash.verify(password).await? {
            return Err(IdentityError::InvalidCredentials);
        }

        Ok(user)
    }

    pub async fn find_by_email(&self, email: &Email) -> IdentityResult<Option<User>> {
        self.repo.find_by_email(email).await
    }

    /// Optimistic write. On success `user.version` is the stored version.
    ///
    /// `EditConflict` if another writer got there first.
    pub async fn update(&self, user: &mut User) -> IdentityResult<()> {
        let version = self.repo.update(user).await?;
        user.version = version;

        tracing::info!(user_id = %user.id, version, "User updated");

        Ok(())
    }

    pub async fn exists_with_email(&self, email: &Email) -> IdentityResult<bool> {
        self.repo.exists_with_email(email).await
    }
}
