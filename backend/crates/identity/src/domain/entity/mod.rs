//! Entity Module

pub mod principal;
pub mod token;
pub mod user;
