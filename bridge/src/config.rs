//! # Configuration
//!
//! Process-wide configuration, read once at startup. The bridge cannot operate
//! without the Credential Issuer's nonce service so configuration is validated
//! eagerly: a missing or malformed value is a startup error, never a
//! per-request one.

use std::env;

use reqwest::Url;

use crate::client::Error;

/// Environment variable holding the base URL of the Credential Issuer's nonce
/// service.
pub const NONCE_SERVICE_URL_VAR: &str = "IDENTUS_URL";

/// Validated bridge configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the Credential Issuer's nonce service.
    pub nonce_service_url: Url,
}

impl Config {
    /// Create configuration from the nonce service's base URL.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL is empty or cannot be parsed.
    /// It must be an `http(s)` URL with no query or fragment, since the
    /// nonce endpoint's path is appended to it.
    pub fn new(nonce_service_url: &str) -> Result<Self, Error> {
        let trimmed = nonce_service_url.trim();
        if trimmed.is_empty() {
            return Err(Error::Configuration("nonce service URL is empty".to_string()));
        }
        let url = Url::parse(trimmed)
            .map_err(|e| Error::Configuration(format!("invalid nonce service URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Configuration(format!(
                "unsupported nonce service URL scheme: {}",
                url.scheme()
            )));
        }
        if url.cannot_be_a_base() || url.query().is_some() || url.fragment().is_some() {
            return Err(Error::Configuration(format!(
                "nonce service URL must be a base URL without query or fragment: {url}"
            )));
        }
        Ok(Self { nonce_service_url: url })
    }

    /// Read configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `IDENTUS_URL` is not set or holds an
    /// invalid URL.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Read configuration using `get` to look up variables.
    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let Some(url) = get(NONCE_SERVICE_URL_VAR) else {
            return Err(Error::Configuration(format!(
                "{NONCE_SERVICE_URL_VAR} is not set: it must hold the nonce service URL"
            )));
        };
        Self::new(&url)
    }
}
