//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in the
//! infrastructure layer. Every call is a single statement; there is no
//! cross-call transaction.

use chrono::{DateTime, Utc};

use crate::domain::entity::{
    token::{AuthenticationToken, VerificationToken},
    user::User,
};
use crate::domain::value_object::{
    email::Email, token_hash::TokenHash, token_scope::TokenScope, user_id::UserId,
    user_password::UserPassword,
};
use crate::error::IdentityResult;

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Insert and return the row with its generated id, created_at and version.
    ///
    /// `DuplicateEmail` on uniqueness conflict.
    async fn insert(&self, email: &Email, password_hash: &UserPassword) -> IdentityResult<User>;

    async fn find_by_email(&self, email: &Email) -> IdentityResult<Option<User>>;

    /// Owner of an authentication token, with the token's expiry
    async fn find_by_authentication_token(
        &self,
        hash: &TokenHash,
    ) -> IdentityResult<Option<(User, DateTime<Utc>)>>;

    async fn exists_with_email(&self, email: &Email) -> IdentityResult<bool>;

    /// Compare-and-swap on `user.version`. Returns the new version.
    ///
    /// `EditConflict` when no row matches id and version.
    async fn update(&self, user: &User) -> IdentityResult<i32>;
}

/// Authentication token repository trait
#[trait_variant::make(AuthenticationTokenRepository: Send)]
pub trait LocalAuthenticationTokenRepository {
    async fn insert_authentication_token(&self, token: &AuthenticationToken) -> IdentityResult<()>;

    async fn delete_authentication_tokens_for_user(&self, user_id: &UserId) -> IdentityResult<u64>;

    /// Drop rows whose expiry has passed
    async fn cleanup_expired_authentication_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> IdentityResult<u64>;
}

/// Verification token repository trait
///
/// `user_id` is part of every lookup key: `None` matches only unbound rows.
#[trait_variant::make(VerificationTokenRepository: Send)]
pub trait LocalVerificationTokenRepository {
    async fn insert_verification_token(&self, token: &VerificationToken) -> IdentityResult<()>;

    /// Any unexpired token for the key
    async fn verification_token_exists(
        &self,
        scope: TokenScope,
        email: &Email,
        user_id: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> IdentityResult<bool>;

    /// Expiry of the token matching the full key, if any
    async fn find_verification_token_expiry(
        &self,
        hash: &TokenHash,
        scope: TokenScope,
        email: &Email,
        user_id: Option<&UserId>,
    ) -> IdentityResult<Option<DateTime<Utc>>>;

    async fn delete_verification_tokens_for_email(&self, email: &Email) -> IdentityResult<u64>;

    async fn delete_verification_tokens_for_user(&self, user_id: &UserId) -> IdentityResult<u64>;

    async fn cleanup_expired_verification_tokens(&self, now: DateTime<Utc>) -> IdentityResult<u64>;
}

/// Everything the identity flows need from one store
pub trait IdentityRepository:
    UserRepository
    + AuthenticationTokenRepository
    + VerificationTokenRepository
    + Clone
    + Send
    + Sync
    + 'static
{
}

impl<T> IdentityRepository for T where
    T: UserRepository
        + AuthenticationTokenRepository
        + VerificationTokenRepository
        + Clone
        + Send
        + Sync
        + 'static
{
}
