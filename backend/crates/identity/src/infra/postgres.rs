//! PostgreSQL Repository Implementation
//!
//! Every statement runs under the configured store timeout; a hung call
//! fails the request with `StoreTimeout` instead of holding it.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

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

/// PostgreSQL-backed identity repository
#[derive(Clone)]
pub struct PgIdentityRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgIdentityRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, query: F) -> IdentityResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| IdentityError::StoreTimeout(self.timeout))?
            .map_err(IdentityError::from)
    }

    /// Remove expired rows from both token tables.
    pub async fn cleanup_expired(&self) -> IdentityResult<u64> {
        let now = Utc::now();
        let authentication = self.cleanup_expired_authentication_tokens(now).await?;
        let verification = self.cleanup_expired_verification_tokens(now).await?;

        tracing::info!(
            authentication_tokens_deleted = authentication,
            verification_tokens_deleted = verification,
            "Cleaned up expired tokens"
        );

        Ok(authentication + verification)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// No row back from the guarded `UPDATE` means the version moved on.
fn updated_version(result: IdentityResult<Option<i32>>) -> IdentityResult<i32> {
    match result {
        Ok(Some(version)) => Ok(version),
        Ok(None) => Err(IdentityError::EditConflict),
        Err(IdentityError::Database(e)) if is_unique_violation(&e) => {
            Err(IdentityError::DuplicateEmail)
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgIdentityRepository {
    async fn insert(&self, email: &Email, password_hash: &UserPassword) -> IdentityResult<User> {
        let result = self
            .bounded(
                sqlx::query_as::<_, UserRow>(
                    r#"
                    INSERT INTO users (email, password_hash)
                    VALUES ($1, $2)
                    RETURNING id, created_at, email, password_hash, version
                    "#,
                )
                .bind(email.as_str())
                .bind(password_hash.as_phc_string())
                .fetch_one(&self.pool),
            )
            .await;

        match result {
            Ok(row) => row.into_user(),
            Err(IdentityError::Database(e)) if is_unique_violation(&e) => {
                Err(IdentityError::DuplicateEmail)
            }
            Err(e) => Err(e),
        }
    }

    async fn find_by_email(&self, email: &Email) -> IdentityResult<Option<User>> {
        let row = self
            .bounded(
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT id, created_at, email, password_hash, version
                    FROM users
                    WHERE email = $1
                    "#,
                )
                .bind(email.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_by_authentication_token(
        &self,
        hash: &TokenHash,
    ) -> IdentityResult<Option<(User, DateTime<Utc>)>> {
        let row = self
            .bounded(
                sqlx::query_as::<_, TokenOwnerRow>(
                    r#"
                    SELECT u.id, u.created_at, u.email, u.password_hash, u.version, t.expiry
                    FROM users u
                    INNER JOIN authentication_tokens t ON t.user_id = u.id
                    WHERE t.hash = $1
                    "#,
                )
                .bind(hash.as_bytes())
                .fetch_optional(&self.pool),
            )
            .await?;

        row.map(|r| r.into_owner()).transpose()
    }

    async fn exists_with_email(&self, email: &Email) -> IdentityResult<bool> {
        self.bounded(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn update(&self, user: &User) -> IdentityResult<i32> {
        let result = self
            .bounded(
                sqlx::query_scalar::<_, i32>(
                    r#"
                    UPDATE users
                    SET email = $1, password_hash = $2, version = version + 1
                    WHERE id = $3 AND version = $4
                    RETURNING version
                    "#,
                )
                .bind(user.email.as_str())
                .bind(user.password_hash.as_phc_string())
                .bind(user.id.as_uuid())
                .bind(user.version)
                .fetch_optional(&self.pool),
            )
            .await;

        updated_version(result)
    }
}

// ============================================================================
// Authentication Token Repository Implementation
// ============================================================================

impl AuthenticationTokenRepository for PgIdentityRepository {
    async fn insert_authentication_token(&self, token: &AuthenticationToken) -> IdentityResult<()> {
        self.bounded(
            sqlx::query(
                r#"
                INSERT INTO authentication_tokens (hash, expiry, user_id)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(token.token.hash().as_bytes())
            .bind(token.token.expiry())
            .bind(token.user_id.as_uuid())
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn delete_authentication_tokens_for_user(&self, user_id: &UserId) -> IdentityResult<u64> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM authentication_tokens WHERE user_id = $1")
                    .bind(user_id.as_uuid())
                    .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected())
    }

    async fn cleanup_expired_authentication_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> IdentityResult<u64> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM authentication_tokens WHERE expiry <= $1")
                    .bind(now)
                    .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected())
    }
}

// ============================================================================
// Verification Token Repository Implementation
// ============================================================================

impl VerificationTokenRepository for PgIdentityRepository {
    async fn insert_verification_token(&self, token: &VerificationToken) -> IdentityResult<()> {
        self.bounded(
            sqlx::query(
                r#"
                INSERT INTO verification_tokens (hash, expiry, scope, email, user_id)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(token.token.hash().as_bytes())
            .bind(token.token.expiry())
            .bind(token.scope.as_str())
            .bind(token.email.as_str())
            .bind(token.user_id.map(UserId::into_uuid))
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn verification_token_exists(
        &self,
        scope: TokenScope,
        email: &Email,
        user_id: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> IdentityResult<bool> {
        self.bounded(
            sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS (
                    SELECT 1
                    FROM verification_tokens
                    WHERE scope = $1
                    AND email = $2
                    AND user_id IS NOT DISTINCT FROM $3
                    AND expiry > $4
                )
                "#,
            )
            .bind(scope.as_str())
            .bind(email.as_str())
            .bind(user_id.map(|id| *id.as_uuid()))
            .bind(now)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn find_verification_token_expiry(
        &self,
        hash: &TokenHash,
        scope: TokenScope,
        email: &Email,
        user_id: Option<&UserId>,
    ) -> IdentityResult<Option<DateTime<Utc>>> {
        self.bounded(
            sqlx::query_scalar::<_, DateTime<Utc>>(
                r#"
                SELECT expiry
                FROM verification_tokens
                WHERE hash = $1
                AND scope = $2
                AND email = $3
                AND user_id IS NOT DISTINCT FROM $4
                "#,
            )
            .bind(hash.as_bytes())
            .bind(scope.as_str())
            .bind(email.as_str())
            .bind(user_id.map(|id| *id.as_uuid()))
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn delete_verification_tokens_for_email(&self, email: &Email) -> IdentityResult<u64> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM verification_tokens WHERE email = $1")
                    .bind(email.as_str())
                    .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_verification_tokens_for_user(&self, user_id: &UserId) -> IdentityResult<u64> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM verification_tokens WHERE user_id = $1")
                    .bind(user_id.as_uuid())
                    .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected())
    }

    async fn cleanup_expired_verification_tokens(&self, now: DateTime<Utc>) -> IdentityResult<u64> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM verification_tokens WHERE expiry <= $1")
                    .bind(now)
                    .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected())
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    email: String,
    password_hash: String,
    version: i32,
}

impl UserRow {
    fn into_user(self) -> IdentityResult<User> {
        Ok(User {
            id: UserId::from_uuid(self.id),
            created_at: self.created_at,
            email: Email::from_db(self.email),
            password_hash: UserPassword::from_phc_string(self.password_hash)?,
            version: self.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TokenOwnerRow {
    #[sqlx(flatten)]
    user: UserRow,
    expiry: DateTime<Utc>,
}

impl TokenOwnerRow {
    fn into_owner(self) -> IdentityResult<(User, DateTime<Utc>)> {
        Ok((self.user.into_user()?, self.expiry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::user_password::RawPassword;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_repo(timeout: Duration) -> PgIdentityRepository {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://identity@localhost/identity")
            .unwrap();
        PgIdentityRepository::new(pool, timeout)
    }

    #[tokio::test]
    async fn test_hung_store_call_times_out() {
        let repo = lazy_repo(Duration::from_millis(20));

        let err = repo
            .bounded(std::future::pending::<Result<(), sqlx::Error>>())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IdentityError::StoreTimeout(limit) if limit == Duration::from_millis(20)
        ));
    }

    #[tokio::test]
    async fn test_store_errors_pass_through_bound() {
        let repo = lazy_repo(Duration::from_secs(1));

        let err = repo
            .bounded(async { Err::<(), _>(sqlx::Error::PoolTimedOut) })
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Database(sqlx::Error::PoolTimedOut)));
    }

    #[test]
    fn test_missing_row_after_update_is_edit_conflict() {
        assert_eq!(updated_version(Ok(Some(4))).unwrap(), 4);
        assert!(matches!(
            updated_version(Ok(None)),
            Err(IdentityError::EditConflict)
        ));
        assert!(matches!(
            updated_version(Err(IdentityError::StoreTimeout(Duration::from_secs(3)))),
            Err(IdentityError::StoreTimeout(_))
        ));
    }

    async fn database_repo() -> PgIdentityRepository {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .unwrap();
        sqlx::migrate!("../../../database/migrations")
            .run(&pool)
            .await
            .unwrap();
        PgIdentityRepository::new(pool, Duration::from_secs(3))
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database at DATABASE_URL"]
    async fn test_concurrent_updates_on_postgres_one_wins() {
        let repo = database_repo().await;
        let email = Email::new(format!("{}@example.com", Uuid::new_v4())).unwrap();
        let password =
            UserPassword::hash(RawPassword::new("pa55word-correct".to_string()).unwrap())
                .await
                .unwrap();
        let user = repo.insert(&email, &password).await.unwrap();

        let (a, b) = tokio::join!(repo.update(&user), repo.update(&user));

        let conflicts = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(IdentityError::EditConflict)))
            .count();
        assert_eq!(conflicts, 1);
        assert_eq!(a.or(b).unwrap(), user.version + 1);

        let stored = repo.find_by_email(&email).await.unwrap().unwrap();
        assert_eq!(stored.version, user.version + 1);
    }
}
