//! Value Object Module

pub mod email;
pub mod token_hash;
pub mod token_scope;
pub mod user_id;
pub mod user_password;
