//! # Token Endpoint
//!
//! The Token Endpoint issues an Access Token and, optionally, a Refresh Token
//! in exchange for the Authorization Code that client obtained in a successful
//! Authorization Response. It is used in the same manner as defined in
//! [RFC6749](https://tools.ietf.org/html/rfc6749#section-5.1).
//!
//! When the authorization session carries an `issuer_state`, the token
//! response is augmented with a `c_nonce` (and its lifetime) obtained from the
//! Credential Issuer. The Wallet uses the nonce in the proof of possession of
//! its Credential Request.

use anyhow::Context as _;
use tracing::instrument;

use crate::ISSUER_STATE;
use crate::handlers::{Error, Result};
use crate::provider::{NonceService, SessionNotes, TokenIssuance};
use crate::types::{GrantType, TokenContext, TokenResponse};

/// Decorates the platform's token minting to add the Credential Issuer's
/// `c_nonce` to authorization code token responses.
#[derive(Clone, Debug)]
pub struct TokenInterceptor<P, N> {
    provider: P,
    nonce_service: N,
}

impl<P, N> TokenInterceptor<P, N> {
    /// Create an interceptor for the current request.
    #[must_use]
    pub const fn new(provider: P, nonce_service: N) -> Self {
        Self { provider, nonce_service }
    }
}

impl<P, N> TokenInterceptor<P, N>
where
    P: TokenIssuance + SessionNotes,
    N: NonceService,
{
    /// Create the token response.
    ///
    /// The platform always mints the token. For an authorization code exchange
    /// whose session has an `issuer_state` note, the response is augmented
    /// with `c_nonce` and `c_nonce_expires_in`. In all other cases the
    /// platform's response is returned untouched.
    ///
    /// # Errors
    ///
    /// Errors raised by the platform are returned unchanged. When the response
    /// should be augmented but the nonce service fails, a `server_error` is
    /// returned: the token is never issued without its nonce.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_token_response(
        &self, context: &TokenContext, grant_type: GrantType,
    ) -> Result<TokenResponse> {
        let mut response =
            TokenIssuance::create_token_response(&self.provider, context, grant_type).await?;

        if !grant_type.is_authorization_code() {
            return Ok(response);
        }
        let Some(issuer_state) = self.issuer_state(&context.session_id).await? else {
            tracing::debug!(session_id = %context.session_id, "no issuer_state: not augmenting");
            return Ok(response);
        };

        tracing::debug!(session_id = %context.session_id, "requesting c_nonce");
        let nonce = self
            .nonce_service
            .request_nonce(&response.access_token, &issuer_state)
            .await
            .map_err(|e| {
                tracing::warn!(session_id = %context.session_id, "nonce service failed: {e}");
                Error::from(e)
            })?;

        response.set_c_nonce(&nonce);
        Ok(response)
    }

    async fn issuer_state(&self, session_id: &str) -> Result<Option<String>> {
        let note = SessionNotes::get_note(&self.provider, session_id, ISSUER_STATE)
            .await
            .context("issue retrieving issuer_state note")?;
        Ok(note)
    }
}

impl<P, N> TokenIssuance for TokenInterceptor<P, N>
where
    P: TokenIssuance + SessionNotes,
    N: NonceService,
{
    async fn create_token_response(
        &self, context: &TokenContext, grant_type: GrantType,
    ) -> anyhow::Result<TokenResponse> {
        Ok(Self::create_token_response(self, context, grant_type).await?)
    }
}
