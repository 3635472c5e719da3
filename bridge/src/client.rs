//! # Issuer Client
//!
//! A client for the Credential Issuer's nonce service. The service binds a
//! fresh `c_nonce` to the `issuer_state` of a pending issuance so the
//! Credential Issuer can later match the Wallet's proof of possession to the
//! issuance it offered.
//!
//! The client is stateless: it is created once at startup and shared between
//! concurrent token requests. Idle connections are not pooled, so each request
//! acquires its own connection and releases it when the response (or error)
//! is dropped. Requests are never retried.

use http::StatusCode;
use reqwest::Url;
use thiserror::Error;
use tracing::instrument;

use crate::config::Config;
use crate::provider::NonceService;
use crate::types::{NonceRequest, NonceResponse};

/// Path of the nonce endpoint, relative to the nonce service's base URL.
pub const NONCES_PATH: &str = "oid4vci/nonces";

/// Errors raised configuring or calling the nonce service.
#[derive(Error, Debug)]
pub enum Error {
    /// The client could not be configured. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The nonce service could not be reached.
    #[error("nonce service unavailable: {0}")]
    Unavailable(String),

    /// The nonce service returned a status other than `200 OK`.
    #[error("nonce service returned status {0}")]
    Rejected(StatusCode),

    /// The nonce service returned `200 OK` with a body that is not a valid
    /// nonce response.
    #[error("malformed nonce service response: {0}")]
    Malformed(String),
}

impl Error {
    /// Whether the error indicates the nonce service could not be used at
    /// all. A malformed response is treated the same as an unreachable
    /// service.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Malformed(_))
    }
}

/// HTTP client for the Credential Issuer's nonce service.
#[derive(Clone, Debug)]
pub struct IssuerClient {
    endpoint: Url,
    http: reqwest::Client,
}

impl IssuerClient {
    /// Create a client for the nonce service named in `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the nonce endpoint cannot be derived
    /// from the configured base URL or the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let base = config.nonce_service_url.as_str().trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/{NONCES_PATH}"))
            .map_err(|e| Error::Configuration(format!("invalid nonce endpoint: {e}")))?;

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| Error::Configuration(format!("issue building http client: {e}")))?;

        tracing::info!(%endpoint, "nonce service configured");
        Ok(Self { endpoint, http })
    }

    /// Create a client configured from the environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the nonce service URL is not set or is
    /// invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::new(&Config::from_env()?)
    }

    /// The nonce endpoint requests are sent to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl NonceService for IssuerClient {
    #[instrument(level = "debug", skip(self, bearer_token))]
    async fn request_nonce(
        &self, bearer_token: &str, issuer_state: &str,
    ) -> Result<NonceResponse, Error> {
        let request = NonceRequest { issuer_state: issuer_state.to_string() };

        let http_resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(bearer_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;

        let status = http_resp.status();
        if status != StatusCode::OK {
            return Err(Error::Rejected(status));
        }

        let body = http_resp.bytes().await.map_err(|e| Error::Unavailable(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| Error::Malformed(e.to_string()))
    }
}
