//! Domain Layer
//!
//! Entities, value objects, repository traits and the token codec.

pub mod entity;
pub mod repository;
pub mod services;
pub mod value_object;

pub use entity::{
    principal::Principal,
    token::{AuthenticationToken, Token, VerificationToken},
    user::User,
};
pub use repository::{
    AuthenticationTokenRepository, IdentityRepository, UserRepository,
    VerificationTokenRepository,
};
pub use services::TokenCodec;
