//! Identity Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits, token codec
//! - `application/` - Token and user stores, use cases
//! - `infra/` - PostgreSQL and in-memory repositories
//! - `presentation/` - HTTP handlers, DTOs, router, middleware
//!
//! ## Features
//! - Registration gated by a mailed verification token
//! - Email/password sign-in issuing opaque bearer tokens
//! - Password reset and email change through scoped verification tokens
//! - Optimistic concurrency on user records
//!
//! ## Security Model
//! - Only SHA-256 digests of tokens are stored
//! - Passwords hashed with Argon2id off the async runtime
//! - Unknown email and wrong password are indistinguishable
//! - Verification requests answer identically whether or not mail was sent

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::IdentityConfig;
pub use error::{IdentityError, IdentityResult};
pub use infra::{memory::InMemoryIdentityRepository, postgres::PgIdentityRepository};
pub use presentation::handlers::IdentityAppState;
pub use presentation::router::{identity_router, identity_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
