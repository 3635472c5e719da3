//! # Test Utilities
//!
//! An in-memory authorization server platform and stand-in nonce services
//! for exercising the bridge.

pub mod nonce;
pub mod platform;

pub use nonce::{Behavior, NonceServer, ScriptedNonces, nonce_for};
pub use platform::Platform;
