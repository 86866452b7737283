//! Application Configuration

use chrono::Duration;

use crate::domain::services::DEFAULT_TOKEN_BYTES;

/// Identity application configuration
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Lifetime of bearer tokens (36 hours)
    pub authentication_token_ttl: Duration,
    /// Lifetime of verification tokens (36 hours)
    pub verification_token_ttl: Duration,
    /// Random bytes per token
    pub token_bytes: usize,
    /// Upper bound on any single store call
    pub store_timeout: std::time::Duration,
    /// `development` or `production`, reported by the healthcheck
    pub environment: String,
    pub version: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            authentication_token_ttl: Duration::hours(36),
            verification_token_ttl: Duration::hours(36),
            token_bytes: DEFAULT_TOKEN_BYTES,
            store_timeout: std::time::Duration::from_secs(3),
            environment: "production".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl IdentityConfig {
    pub fn development() -> Self {
        Self {
            environment: "development".to_string(),
            ..Default::default()
        }
    }
}
