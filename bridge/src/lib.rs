//! An extension to an OAuth 2.0 / `OpenID` Connect authorization server that
//! supports the authorization code flow of [OpenID for Verifiable Credential
//! Issuance](https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0.html).
//!
//! The Credential Issuer supplies an `issuer_state` value in its Credential
//! Offer. The Wallet passes it to the authorization server in its
//! Authorization Request and the authorization server carries it across the
//! authorization code exchange. When the code is exchanged for an access
//! token, the issuer's nonce service is asked for a fresh `c_nonce` which is
//! returned alongside the access token.
//!
//! The crate does not implement an authorization server. Instead, the
//! [`AuthorizationInterceptor`] and [`TokenInterceptor`] decorate the
//! server's own authorization and token handling, provided by implementing
//! the traits in [`provider`].

pub mod client;
pub mod config;
pub mod http;
pub mod protocol;
pub mod provider;
pub mod types;

mod error;
mod handlers;

pub use self::client::IssuerClient;
pub use self::config::Config;
pub use self::error::Error;
pub use self::handlers::*;
pub use self::protocol::{Protocol, ProtocolContext, ProtocolFactory, ProtocolService, Registry};
pub use self::types::*;

/// Query parameter (and session note key) holding the Credential Issuer's
/// `issuer_state`.
pub const ISSUER_STATE: &str = "issuer_state";

/// Token response claim holding the credential issuance nonce.
pub const C_NONCE: &str = "c_nonce";

/// Token response claim holding the lifetime, in seconds, of the `c_nonce`.
pub const C_NONCE_EXPIRES_IN: &str = "c_nonce_expires_in";
