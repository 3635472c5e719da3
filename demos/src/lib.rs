//! Demos
//!
//! An authorization server with the bridge registered.

pub mod server;
