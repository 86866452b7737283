//! In-Memory Repository Implementation
//!
//! Same contract as the PostgreSQL repository, held in one mutex. Used by
//! tests and local runs without a database.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::entity::{
    token::{AuthenticationToken, VerificationToken},
    user::User,
};
use crate::domain::repository::{
    AuthenticationTokenRepository, UserRepository, VerificationTokenRepository,
};
use crate::domain::value_object::{
    email::Email, token_hash::TokenHash, token_scope::TokenScope, user_id::UserId,
    user_password::UserPassword,
};
use crate::error::{IdentityError, IdentityResult};

#[derive(Debug, Clone)]
struct AuthenticationRow {
    user_id: UserId,
    expiry: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct VerificationRow {
    scope: TokenScope,
    email: Email,
    user_id: Option<UserId>,
    expiry: DateTime<Utc>,
}

impl VerificationRow {
    fn matches(&self, scope: TokenScope, email: &Email, user_id: Option<&UserId>) -> bool {
        self.scope == scope && &self.email == email && self.user_id.as_ref() == user_id
    }
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    authentication_tokens: HashMap<TokenHash, AuthenticationRow>,
    verification_tokens: HashMap<TokenHash, VerificationRow>,
}

impl State {
    fn email_taken(&self, email: &Email, except: Option<&UserId>) -> bool {
        self.users
            .values()
            .any(|u| &u.email == email && Some(&u.id) != except)
    }
}

/// In-memory identity repository
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> IdentityResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| IdentityError::Internal("identity store lock poisoned".to_string()))
    }

    pub fn user_count(&self) -> usize {
        self.lock().map(|s| s.users.len()).unwrap_or_default()
    }

    pub fn authentication_token_count(&self) -> usize {
        self.lock()
            .map(|s| s.authentication_tokens.len())
            .unwrap_or_default()
    }

    pub fn verification_token_count(&self) -> usize {
        self.lock()
            .map(|s| s.verification_tokens.len())
            .unwrap_or_default()
    }
}

impl UserRepository for InMemoryIdentityRepository {
    async fn insert(&self, email: &Email, password_hash: &UserPassword) -> IdentityResult<User> {
        let mut state = self.lock()?;
        if state.email_taken(email, None) {
            return Err(IdentityError::DuplicateEmail);
        }

        let user = User {
            id: UserId::new(),
            created_at: Utc::now(),
            email: email.clone(),
            password_hash: password_hash.clone(),
            version: 1,
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_email(&self, email: &Email) -> IdentityResult<Option<User>> {
        let state = self.lock()?;
        Ok(state.users.values().find(|u| &u.email == email).cloned())
    }

    async fn find_by_authentication_token(
        &self,
        hash: &TokenHash,
    ) -> IdentityResult<Option<(User, DateTime<Utc>)>> {
        let state = self.lock()?;
        let owner = state.authentication_tokens.get(hash).and_then(|row| {
            state
                .users
                .get(&row.user_id)
                .map(|user| (user.clone(), row.expiry))
        });
        Ok(owner)
    }

    async fn exists_with_email(&self, email: &Email) -> IdentityResult<bool> {
        Ok(self.lock()?.email_taken(email, None))
    }

    async fn update(&self, user: &User) -> IdentityResult<i32> {
        let mut state = self.lock()?;

        match state.users.get(&user.id) {
            Some(stored) if stored.version == user.version => {}
            _ => return Err(IdentityError::EditConflict),
        }
        if state.email_taken(&user.email, Some(&user.id)) {
            return Err(IdentityError::DuplicateEmail);
        }

        let version = user.version + 1;
        let mut stored = user.clone();
        stored.version = version;
        state.users.insert(stored.id, stored);

        Ok(version)
    }
}

impl AuthenticationTokenRepository for InMemoryIdentityRepository {
    async fn insert_authentication_token(&self, token: &AuthenticationToken) -> IdentityResult<()> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&token.user_id) {
            return Err(IdentityError::Internal(
                "authentication token references a missing user".to_string(),
            ));
        }
        state.authentication_tokens.insert(
            *token.token.hash(),
            AuthenticationRow {
                user_id: token.user_id,
                expiry: token.token.expiry(),
            },
        );
        Ok(())
    }

    async fn delete_authentication_tokens_for_user(&self, user_id: &UserId) -> IdentityResult<u64> {
        let mut state = self.lock()?;
        let before = state.authentication_tokens.len();
        state
            .authentication_tokens
            .retain(|_, row| &row.user_id != user_id);
        Ok((before - state.authentication_tokens.len()) as u64)
    }

    async fn cleanup_expired_authentication_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> IdentityResult<u64> {
        let mut state = self.lock()?;
        let before = state.authentication_tokens.len();
        state.authentication_tokens.retain(|_, row| now < row.expiry);
        Ok((before - state.authentication_tokens.len()) as u64)
    }
}

impl VerificationTokenRepository for InMemoryIdentityRepository {
    async fn insert_verification_token(&self, token: &VerificationToken) -> IdentityResult<()> {
        let mut state = self.lock()?;
        state.verification_tokens.insert(
            *token.token.hash(),
            VerificationRow {
                scope: token.scope,
                email: token.email.clone(),
                user_id: token.user_id,
                expiry: token.token.expiry(),
            },
        );
        Ok(())
    }

    async fn verification_token_exists(
        &self,
        scope: TokenScope,
        email: &Email,
        user_id: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> IdentityResult<bool> {
        let state = self.lock()?;
        Ok(state
            .verification_tokens
            .values()
            .any(|row| row.matches(scope, email, user_id) && now < row.expiry))
    }

    async fn find_verification_token_expiry(
        &self,
        hash: &TokenHash,
        scope: TokenScope,
        email: &Email,
        user_id: Option<&UserId>,
    ) -> IdentityResult<Option<DateTime<Utc>>> {
        let state = self.lock()?;
        Ok(state
            .verification_tokens
            .get(hash)
            .filter(|row| row.matches(scope, email, user_id))
            .map(|row| row.expiry))
    }

    async fn delete_verification_tokens_for_email(&self, email: &Email) -> IdentityResult<u64> {
        let mut state = self.lock()?;
        let before = state.verification_tokens.len();
        state.verification_tokens.retain(|_, row| &row.email != email);
        Ok((before - state.verification_tokens.len()) as u64)
    }

    async fn delete_verification_tokens_for_user(&self, user_id: &UserId) -> IdentityResult<u64> {
        let mut state = self.lock()?;
        let before = state.verification_tokens.len();
        state
            .verification_tokens
            .retain(|_, row| row.user_id.as_ref() != Some(user_id));
        Ok((before - state.verification_tokens.len()) as u64)
    }

    async fn cleanup_expired_verification_tokens(&self, now: DateTime<Utc>) -> IdentityResult<u64> {
        let mut state = self.lock()?;
        let before = state.verification_tokens.len();
        state.verification_tokens.retain(|_, row| now < row.expiry);
        Ok((before - state.verification_tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHC: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$2DKhYQeUYzV1Dw0WQxgP5yxNwY4c2cSGfNvvZRHqGgI";

    fn password() -> UserPassword {
        UserPassword::from_phc_string(PHC).unwrap()
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_email() {
        let repo = InMemoryIdentityRepository::new();
        let email = Email::new("user@example.com").unwrap();

        let user = repo.insert(&email, &password()).await.unwrap();
        assert_eq!(user.version, 1);

        let err = repo.insert(&email, &password()).await.unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateEmail));
        assert_eq!(repo.user_count(), 1);
    }

    #[tokio::test]
    async fn test_update_is_compare_and_swap() {
        let repo = InMemoryIdentityRepository::new();
        let email = Email::new("user@example.com").unwrap();
        let user = repo.insert(&email, &password()).await.unwrap();

        let stale = user.clone();
        assert_eq!(repo.update(&user).await.unwrap(), 2);

        let err = repo.update(&stale).await.unwrap_err();
        assert!(matches!(err, IdentityError::EditConflict));
    }

    #[tokio::test]
    async fn test_update_rejects_taken_email() {
        let repo = InMemoryIdentityRepository::new();
        let first = Email::new("first@example.com").unwrap();
        let second = Email::new("second@example.com").unwrap();
        repo.insert(&first, &password()).await.unwrap();
        let mut user = repo.insert(&second, &password()).await.unwrap();

        user.set_email(first);
        let err = repo.update(&user).await.unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_unbound_lookup_ignores_bound_rows() {
        let repo = InMemoryIdentityRepository::new();
        let email = Email::new("user@example.com").unwrap();
        let now = Utc::now();

        let row = VerificationRow {
            scope: TokenScope::EmailChange,
            email: email.clone(),
            user_id: Some(UserId::new()),
            expiry: now + chrono::Duration::hours(1),
        };
        assert!(!row.matches(TokenScope::EmailChange, &email, None));

        repo.lock()
            .unwrap()
            .verification_tokens
            .insert(TokenHash::from_bytes([7; 32]), row);

        assert!(
            !repo
                .verification_token_exists(TokenScope::EmailChange, &email, None, now)
                .await
                .unwrap()
        );
    }
}
