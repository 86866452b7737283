//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations with no domain vocabulary:
//! - Cryptographic utilities (CSPRNG, SHA-256, URL-safe Base64)
//! - Password hashing (Argon2id)
//! - Clocks (system and manually driven)
//! - Client identification
//! - Per-client rate limiting
//! - Background task tracking and graceful shutdown
//! - Mail transports
//! - HTTP request metrics

pub mod background;
pub mod client;
pub mod clock;
pub mod crypto;
pub mod mail;
pub mod metrics;
pub mod password;
pub mod rate_limit;
pub mod shutdown;
