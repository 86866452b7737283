//! Request extractors

use axum::extract::FromRequest;

use crate::error::IdentityError;

/// `axum::Json` whose rejection renders as a problem document
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(IdentityError))]
pub struct JsonBody<T>(pub T);
