//! Request principal

use super::user::User;

/// Who is making the request
///
/// Anonymous is a variant, not a sentinel user, so it can never compare
/// equal to a persisted user.
#[derive(Debug, Clone, Default)]
pub enum Principal {
    #[default]
    Anonymous,
    Authenticated(User),
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Anonymous => None,
            Principal::Authenticated(user) => Some(user),
        }
    }

    pub fn into_user(self) -> Option<User> {
        match self {
            Principal::Anonymous => None,
            Principal::Authenticated(user) => Some(user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::{
        email::Email, user_id::UserId, user_password::UserPassword,
    };

    #[test]
    fn test_anonymous_is_not_a_user() {
        let principal = Principal::default();
        assert!(principal.is_anonymous());
        assert!(principal.user().is_none());
    }

    #[test]
    fn test_authenticated_exposes_user() {
        let user = User {
            id: UserId::new(),
            created_at: chrono::Utc::now(),
            email: Email::from_db("user@example.com"),
            password_hash: UserPassword::from_phc_string(
                "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$2DKhYQeUYzV1Dw0WQxgP5yxNwY4c2cSGfNvvZRHqGgI",
            )
            .unwrap(),
            version: 1,
        };
        let principal = Principal::Authenticated(user.clone());
        assert!(!principal.is_anonymous());
        assert_eq!(principal.into_user(), Some(user));
    }
}
