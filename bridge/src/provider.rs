//! # Provider Traits
//!
//! This module defines the traits implemented by the host authorization
//! server (the platform) so the bridge can decorate its authorization and
//! token handling, and the trait used to obtain nonces from the Credential
//! Issuer.
//!
//! The platform remains responsible for authenticating users and clients,
//! minting tokens, and persisting sessions. The bridge only annotates the
//! sessions it is given and augments the token responses it is handed back.

use std::future::Future;

use anyhow::Result;

use crate::client;
use crate::types::{
    AuthenticationSession, AuthorizationRequest, GrantType, NonceResponse, TokenContext,
    TokenResponse,
};

/// Platform Provider trait.
pub trait Provider: SessionNotes + Authorization + TokenIssuance + Clone {}

/// A blanket implementation for `Provider` trait so that any type implementing
/// the required super traits is considered a `Provider`.
impl<T> Provider for T where T: SessionNotes + Authorization + TokenIssuance + Clone {}

/// The `SessionNotes` trait is implemented by the platform to attach
/// key/value notes to an authentication session.
///
/// Notes written during the authorization leg must be readable, using the same
/// session identifier, during the token leg of the same flow. The two legs may
/// run on different threads or server instances.
pub trait SessionNotes: Send + Sync {
    /// Retrieve the note stored under `key` for the session, if any.
    fn get_note(
        &self, session_id: &str, key: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Store a note under `key` for the session, replacing any existing value.
    fn set_note(
        &self, session_id: &str, key: &str, value: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// The platform's handling of Authorization Requests.
pub trait Authorization: Send + Sync {
    /// Create (or update) the authentication session for the request. The
    /// rest of the authorization flow (login, consent, redirect) continues
    /// against the returned session.
    fn create_session(
        &self, request: &AuthorizationRequest,
    ) -> impl Future<Output = Result<AuthenticationSession>> + Send;
}

/// The platform's token minting.
pub trait TokenIssuance: Send + Sync {
    /// Build the token response for an authenticated user, session, and client.
    fn create_token_response(
        &self, context: &TokenContext, grant_type: GrantType,
    ) -> impl Future<Output = Result<TokenResponse>> + Send;
}

/// The Credential Issuer's nonce service.
pub trait NonceService: Send + Sync {
    /// Request a fresh `c_nonce` bound to `issuer_state`, authorizing the
    /// request with `bearer_token`.
    fn request_nonce(
        &self, bearer_token: &str, issuer_state: &str,
    ) -> impl Future<Output = Result<NonceResponse, client::Error>> + Send;
}
