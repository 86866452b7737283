//! User Password Value Object
//!
//! Domain wrapper over `platform::password`. Policy failures become
//! validation errors on the `password` field.

use platform::password::{ClearTextPassword, HashedPassword, PasswordPolicyError};
use std::fmt;

use crate::error::{IdentityError, IdentityResult};

/// Raw password from user input, zeroized on drop
pub struct RawPassword(ClearTextPassword);

impl RawPassword {
    /// Validate a new password (8 to 72 characters after NFKC).
    pub fn new(raw: String) -> IdentityResult<Self> {
        let clear_text = ClearTextPassword::new(raw).map_err(|e| match e {
            PasswordPolicyError::TooShort { min, .. } => IdentityError::validation(
                "password",
                format!("must be at least {} characters long", min),
            ),
            PasswordPolicyError::TooLong { max, .. } => IdentityError::validation(
                "password",
                format!("must not be more than {} characters long", max),
            ),
            PasswordPolicyError::EmptyOrWhitespace => {
                IdentityError::validation("password", "must be provided")
            }
        })?;

        Ok(Self(clear_text))
    }

    /// Candidate password for a credential check; no policy applied.
    pub fn candidate(raw: String) -> Self {
        Self(ClearTextPassword::for_verification(raw))
    }
}

impl fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPassword").field(&"[REDACTED]").finish()
    }
}

/// Argon2id hash in PHC format
#[derive(Clone, PartialEq, Eq)]
pub struct UserPassword(HashedPassword);

impl UserPassword {
    /// Hash on the blocking pool; Argon2id is deliberately slow.
    pub async fn hash(raw: RawPassword) -> IdentityResult<Self> {
        let hashed = tokio::task::spawn_blocking(move || raw.0.hash())
            .await?
            .map_err(|e| IdentityError::Internal(e.to_string()))?;

        Ok(Self(hashed))
    }

    /// Verify on the blocking pool.
    pub async fn verify(&self, raw: RawPassword) -> IdentityResult<bool> {
        let hashed = self.0.clone();
        let matches = tokio::task::spawn_blocking(move || hashed.verify(&raw.0)).await?;
        Ok(matches)
    }

    /// Create from PHC string (from database)
    pub fn from_phc_string(phc_string: impl Into<String>) -> IdentityResult<Self> {
        let hashed = HashedPassword::from_phc_string(phc_string)
            .map_err(|_| IdentityError::Internal("Invalid password hash in database".to_string()))?;

        Ok(Self(hashed))
    }

    pub fn as_phc_string(&self) -> &str {
        self.0.as_phc_string()
    }
}

impl fmt::Debug for UserPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_password_validation() {
        assert!(RawPassword::new("ValidPass123!".to_string()).is_ok());

        let err = RawPassword::new("short".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "password: must be at least 8 characters long");

        let err = RawPassword::new("a".repeat(73)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "password: must not be more than 72 characters long"
        );

        assert!(RawPassword::new("".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hashed = UserPassword::hash(RawPassword::new("TestPassword123!".to_string()).unwrap())
            .await
            .unwrap();

        assert!(
            hashed
                .verify(RawPassword::candidate("TestPassword123!".to_string()))
                .await
                .unwrap()
        );
        assert!(
            !hashed
                .verify(RawPassword::candidate("WrongPassword123!".to_string()))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_out_of_policy_candidate_just_fails() {
        let hashed = UserPassword::hash(RawPassword::new("TestPassword123!".to_string()).unwrap())
            .await
            .unwrap();
        assert!(!hashed.verify(RawPassword::candidate("x".to_string())).await.unwrap());
    }

    #[tokio::test]
    async fn test_phc_string_roundtrip() {
        let hashed = UserPassword::hash(RawPassword::new("TestPassword123!".to_string()).unwrap())
            .await
            .unwrap();
        let restored = UserPassword::from_phc_string(hashed.as_phc_string()).unwrap();
        assert_eq!(restored, hashed);
    }

    #[test]
    fn test_debug_redaction() {
        let raw = RawPassword::candidate("SecretPassword123!".to_string());
        let debug = format!("{:?}", raw);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("Secret"));
    }
}
