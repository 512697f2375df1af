//! Core types and error handling for toolport.
//!
//! This crate provides the foundational pieces shared by every adapter:
//! the error type, the environment configuration loader, the secret
//! wrapper used for credentials and request URL construction.

pub mod endpoint;
pub mod env;
pub mod error;
pub mod secret;

pub use endpoint::endpoint;
pub use env::EnvSource;
pub use error::{Error, Result, ResultExt};
pub use secret::Secret;
