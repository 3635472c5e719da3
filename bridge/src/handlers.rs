//! # Handlers
//!
//! Interceptors decorating the platform's authorization and token endpoints.
//! Each wraps a delegate implementing the same operation, calls it, and
//! applies the `OpenID4VCI` specific behaviour before or after.

mod authorize;
mod token;

pub use self::authorize::AuthorizationInterceptor;
pub use self::token::TokenInterceptor;
pub use crate::error::Error;

/// Result type for the bridge's handlers.
pub type Result<T, E = Error> = anyhow::Result<T, E>;
