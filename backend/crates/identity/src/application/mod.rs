//! Application Layer
//!
//! Token and user stores, and the use cases built on them.

pub mod authentication_tokens;
pub mod config;
pub mod request_verification;
pub mod reset_password;
pub mod sign_in;
pub mod sign_up;
pub mod update_account;
pub mod users;
pub mod verification_tokens;

// Re-exports
pub use authentication_tokens::AuthenticationTokenStore;
pub use config::IdentityConfig;
pub use request_verification::{RequestVerificationUseCase, VerificationOutcome};
pub use reset_password::{ResetPasswordInput, ResetPasswordUseCase};
pub use sign_in::{SignInInput, SignInUseCase};
pub use sign_up::{SignUpInput, SignUpUseCase};
pub use update_account::{UpdateAccountInput, UpdateAccountUseCase};
pub use users::UserRecordStore;
pub use verification_tokens::VerificationTokenStore;
