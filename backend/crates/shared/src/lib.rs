//! Shared Kernel
//!
//! Vocabulary shared by every crate in the workspace:
//! - The unified error type ([`error::app_error::AppError`]) and its kinds
//! - Typed identifiers ([`id::Id`])
//!
//! Only things with the same meaning in every domain belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
