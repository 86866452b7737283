//! Process configuration from the environment

use anyhow::Context;
use platform::rate_limit::RateLimitConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    /// `development` or `production`. Unset means `production`.
    pub environment: String,
    pub limiter: RateLimitConfig,
    /// Mail relay endpoint. Unset means mail is only logged.
    pub mail_relay_url: Option<String>,
    pub mail_sender: String,
    pub trusted_origins: Vec<String>,
    pub shutdown_grace: Duration,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url =
            lookup("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

        let limiter = RateLimitConfig {
            requests_per_second: parse_var(&lookup, "LIMITER_RPS", 2.0)?,
            burst: parse_var(&lookup, "LIMITER_BURST", 4)?,
            enabled: parse_var(&lookup, "LIMITER_ENABLED", true)?,
            ..RateLimitConfig::default()
        };

        let trusted_origins = lookup("CORS_TRUSTED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_owned)
            .collect();

        Ok(Self {
            port: parse_var(&lookup, "PORT", 8080)?,
            database_url,
            database_max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            environment: lookup("APP_ENV").unwrap_or_else(|| "production".to_string()),
            limiter,
            mail_relay_url: lookup("MAIL_RELAY_URL").filter(|url| !url.is_empty()),
            mail_sender: lookup("MAIL_SENDER").unwrap_or_else(|| "no-reply@localhost".to_string()),
            trusted_origins,
            shutdown_grace: Duration::from_secs(parse_var(&lookup, "SHUTDOWN_GRACE_SECS", 5)?),
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Mail goes to the relay unless running in development or no relay is set.
    pub fn relays_mail(&self) -> bool {
        self.mail_relay_url.is_some() && !self.is_development()
    }
}

fn parse_var<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<ApiConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ApiConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_to_production() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/identity"),
            ("MAIL_RELAY_URL", "https://relay.example.com/send"),
        ])
        .unwrap();

        assert_eq!(config.environment, "production");
        assert!(!config.is_development());
        assert!(config.relays_mail());
        assert_eq!(config.port, 8080);
        assert_eq!(config.limiter.burst, 4);
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_development_only_logs_mail() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/identity"),
            ("APP_ENV", "development"),
            ("MAIL_RELAY_URL", "https://relay.example.com/send"),
        ])
        .unwrap();
        assert!(!config.relays_mail());

        let config = load(&[("DATABASE_URL", "postgres://localhost/identity")]).unwrap();
        assert!(!config.relays_mail());
    }

    #[test]
    fn test_trusted_origins_are_split_and_trimmed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/identity"),
            ("CORS_TRUSTED_ORIGINS", "http://a.test, ,http://b.test "),
        ])
        .unwrap();
        assert_eq!(config.trusted_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_missing_database_url_and_bad_values_fail() {
        assert!(load(&[]).is_err());

        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/identity"),
            ("PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
