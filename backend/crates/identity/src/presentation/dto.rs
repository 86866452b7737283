//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::entity::{token::AuthenticationToken, user::User};

// ============================================================================
// Requests
// ============================================================================

/// Body of the verification-token requests
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    pub email: String,
}

/// Sign in request
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Registration and password reset: credentials plus the mailed token
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCredentialsRequest {
    pub email: String,
    pub password: String,
    pub token: String,
}

/// Partial account update
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAccountRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    /// Email-change token, required together with `email`
    pub token: Option<String>,
}

const REDACTED: &str = "[REDACTED]";

impl fmt::Debug for CredentialsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsRequest")
            .field("email", &self.email)
            .field("password", &REDACTED)
            .finish()
    }
}

impl fmt::Debug for TokenCredentialsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCredentialsRequest")
            .field("email", &self.email)
            .field("password", &REDACTED)
            .field("token", &REDACTED)
            .finish()
    }
}

impl fmt::Debug for UpdateAccountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateAccountRequest")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .finish()
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Public view of a user. The password hash and version stay server-side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub created_at: DateTime<Utc>,
    pub email: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            created_at: user.created_at,
            email: user.email.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

impl From<&User> for UserEnvelope {
    fn from(user: &User) -> Self {
        Self { user: user.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthenticationTokenResponse {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationTokenEnvelope {
    pub authentication_token: AuthenticationTokenResponse,
}

impl From<&AuthenticationToken> for AuthenticationTokenEnvelope {
    fn from(token: &AuthenticationToken) -> Self {
        Self {
            authentication_token: AuthenticationTokenResponse {
                token: token.token.plaintext().to_owned(),
                expiry: token.token.expiry(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Healthcheck
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthcheckResponse {
    pub status: &'static str,
    pub system_info: SystemInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub environment: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_fields_are_optional() {
        let req: UpdateAccountRequest =
            serde_json::from_str(r#"{"password":"pa55word!"}"#).unwrap();
        assert!(req.email.is_none());
        assert!(req.token.is_none());
        assert_eq!(req.password.as_deref(), Some("pa55word!"));
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let credentials = format!(
            "{:?}",
            CredentialsRequest {
                email: "user@example.com".to_string(),
                password: "hunter2-secret".to_string(),
            }
        );
        assert!(credentials.contains("user@example.com"));
        assert!(!credentials.contains("hunter2-secret"));

        let with_token = format!(
            "{:?}",
            TokenCredentialsRequest {
                email: "user@example.com".to_string(),
                password: "hunter2-secret".to_string(),
                token: "Y2xlYXJ0ZXh0LXRva2Vu".to_string(),
            }
        );
        assert!(!with_token.contains("hunter2-secret"));
        assert!(!with_token.contains("Y2xlYXJ0ZXh0LXRva2Vu"));

        let update = format!(
            "{:?}",
            UpdateAccountRequest {
                email: None,
                password: Some("hunter2-secret".to_string()),
                token: None,
            }
        );
        assert!(!update.contains("hunter2-secret"));
        assert!(update.contains("token: None"));
    }

    #[test]
    fn test_healthcheck_shape() {
        let body = serde_json::to_value(HealthcheckResponse {
            status: "available",
            system_info: SystemInfo {
                environment: "development".to_string(),
                version: "0.1.0".to_string(),
            },
        })
        .unwrap();

        assert_eq!(body["status"], "available");
        assert_eq!(body["systemInfo"]["environment"], "development");
    }
}
