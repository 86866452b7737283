//! User Entity

use chrono::{DateTime, Utc};

use crate::domain::value_object::{email::Email, user_id::UserId, user_password::UserPassword};

/// Persisted user
///
/// Mutated only by read-modify-write: `version` is the value read, and the
/// store rejects the write if it has moved on.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
    pub email: Email,
    pub password_hash: UserPassword,
    pub version: i32,
}

impl User {
    pub fn set_email(&mut self, email: Email) {
        self.email = email;
    }

    pub fn set_password_hash(&mut self, password_hash: UserPassword) {
        self.password_hash = password_hash;
    }
}
