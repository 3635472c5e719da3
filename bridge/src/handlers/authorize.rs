//! # Authorization Endpoint
//!
//! The Authorization Endpoint is used by Wallets to request access to the
//! Credential Endpoint, that is, to request issuance of a Credential. The
//! endpoint is used in the same manner as defined in [RFC6749].
//!
//! When the Wallet was given an `issuer_state` in a Credential Offer, it
//! includes the value in its Authorization Request. The interceptor records it
//! against the authentication session so the token endpoint can retrieve it
//! once the authorization code is exchanged.
//!
//! [RFC6749]: (https://www.rfc-editor.org/rfc/rfc6749.html)

use anyhow::Context as _;
use tracing::instrument;

use crate::ISSUER_STATE;
use crate::handlers::Result;
use crate::provider::{Authorization, SessionNotes};
use crate::types::{AuthenticationSession, AuthorizationRequest};

/// Decorates the platform's authorization handling to capture the Credential
/// Issuer's `issuer_state`.
#[derive(Clone, Debug)]
pub struct AuthorizationInterceptor<P> {
    provider: P,
}

impl<P> AuthorizationInterceptor<P> {
    /// Create an interceptor for the current request.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: Authorization + SessionNotes> AuthorizationInterceptor<P> {
    /// Create the authentication session for the request, noting the
    /// `issuer_state` (if provided) against the session.
    ///
    /// A malformed `issuer_state` is not noted and the request otherwise
    /// proceeds unchanged: the bridge never fails the authorization leg.
    ///
    /// # Errors
    ///
    /// Errors raised by the platform while creating the session, or while
    /// saving the note, are returned.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_session(
        &self, request: &AuthorizationRequest,
    ) -> Result<AuthenticationSession> {
        let issuer_state = request.issuer_state().unwrap_or_else(|e| {
            tracing::warn!("not noting issuer_state: {e}");
            None
        });
        let session = Authorization::create_session(&self.provider, request).await?;

        if let Some(issuer_state) = issuer_state {
            tracing::debug!(session_id = %session.id, "noting issuer_state");
            SessionNotes::set_note(&self.provider, &session.id, ISSUER_STATE, &issuer_state)
                .await
                .context("issue saving issuer_state note")?;
        }

        Ok(session)
    }
}

impl<P: Authorization + SessionNotes> Authorization for AuthorizationInterceptor<P> {
    async fn create_session(
        &self, request: &AuthorizationRequest,
    ) -> anyhow::Result<AuthenticationSession> {
        Ok(Self::create_session(self, request).await?)
    }
}
