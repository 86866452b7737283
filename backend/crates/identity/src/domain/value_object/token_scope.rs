use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::IdentityError;

/// Intended use of a verification token. Part of the lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
pub enum TokenScope {
    #[display("registration")]
    Registration,
    #[display("email-change")]
    EmailChange,
    #[display("password-reset")]
    PasswordReset,
    #[display("account-deletion")]
    AccountDeletion,
}

impl TokenScope {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        use TokenScope::*;
        match self {
            Registration => "registration",
            EmailChange => "email-change",
            PasswordReset => "password-reset",
            AccountDeletion => "account-deletion",
        }
    }

    /// Mail template announcing a token of this scope
    #[inline]
    pub const fn mail_template(&self) -> &'static str {
        self.as_str()
    }
}

impl FromStr for TokenScope {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use TokenScope::*;
        match s {
            "registration" => Ok(Registration),
            "email-change" => Ok(EmailChange),
            "password-reset" => Ok(PasswordReset),
            "account-deletion" => Ok(AccountDeletion),
            other => Err(IdentityError::Internal(format!("unknown token scope: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_strings() {
        for scope in [
            TokenScope::Registration,
            TokenScope::EmailChange,
            TokenScope::PasswordReset,
            TokenScope::AccountDeletion,
        ] {
            assert_eq!(scope.to_string(), scope.as_str());
            assert_eq!(scope.as_str().parse::<TokenScope>().unwrap(), scope);
        }
    }

    #[test]
    fn test_unknown_scope() {
        assert!("login".parse::<TokenScope>().is_err());
    }
}
