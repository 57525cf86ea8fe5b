//! Typed access to the consultation backend.
//!
//! Every operation resolves to an [`ApiResult`]: `Ok` carries validated data,
//! `Err` carries a user-facing message and, through
//! [`AppError::needs_reauth`], whether the credential was rejected. Nothing
//! here clears the session on its own except the explicit [`ApiClient::logout`].

pub mod client;
pub mod wire;

pub use client::ApiClient;

use crate::errors::AppError;

pub type ApiResult<T> = Result<T, AppError>;
