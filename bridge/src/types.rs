//! # Types
//!
//! Request and response types used by the bridge's interceptors and the
//! Credential Issuer's nonce service.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::invalid;
use crate::{C_NONCE, C_NONCE_EXPIRES_IN, Error, ISSUER_STATE};

/// Maximum length, in bytes, accepted for an `issuer_state` value.
pub const MAX_ISSUER_STATE_LEN: usize = 2048;

/// The Credential Issuer's correlation handle for a single issuance attempt.
///
/// The value is opaque and untrusted. It is accepted only when it is
/// non-empty, no longer than [`MAX_ISSUER_STATE_LEN`] and made entirely of
/// visible ASCII characters, so it can be safely carried in headers, URLs and
/// JSON bodies.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IssuerState(String);

impl IssuerState {
    /// Validate and wrap an `issuer_state` value.
    ///
    /// # Errors
    ///
    /// Returns an `invalid_request` error if the value is empty, too long, or
    /// contains whitespace, control or non-ASCII characters.
    pub fn new(value: impl Into<String>) -> Result<Self, Error> {
        let value = value.into();
        if value.is_empty() {
            return Err(invalid!("`issuer_state` is empty"));
        }
        if value.len() > MAX_ISSUER_STATE_LEN {
            return Err(invalid!("`issuer_state` exceeds {MAX_ISSUER_STATE_LEN} bytes"));
        }
        if !value.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(invalid!("`issuer_state` contains invalid characters"));
        }
        Ok(Self(value))
    }

    /// The `issuer_state` as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for IssuerState {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for IssuerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An inbound Authorization Request as seen by the authorization interceptor.
///
/// Parameters are kept untyped: the platform owns their interpretation. When
/// a parameter is repeated, the first value is used.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Query parameters of the request, in the order received.
    pub params: Vec<(String, String)>,
}

impl AuthorizationRequest {
    /// Create a request from a raw, `application/x-www-form-urlencoded`
    /// query string (without the leading `?`).
    ///
    /// # Errors
    ///
    /// Returns an `invalid_request` error if the query string cannot be
    /// decoded.
    pub fn from_query(query: &str) -> Result<Self, Error> {
        let params = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .map_err(|e| invalid!("invalid query string: {e}"))?;
        Ok(Self { params })
    }

    /// The first value of the named query parameter, if present.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// The `client_id` parameter, if present.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.param("client_id")
    }

    /// The `state` parameter, if present.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.param("state")
    }

    /// The validated `issuer_state` parameter, if present.
    ///
    /// # Errors
    ///
    /// Returns an `invalid_request` error if the parameter is present but
    /// invalid.
    pub fn issuer_state(&self) -> Result<Option<IssuerState>, Error> {
        self.param(ISSUER_STATE).map(IssuerState::new).transpose()
    }
}

impl From<HashMap<String, String>> for AuthorizationRequest {
    fn from(params: HashMap<String, String>) -> Self {
        Self { params: params.into_iter().collect() }
    }
}

impl From<Vec<(String, String)>> for AuthorizationRequest {
    fn from(params: Vec<(String, String)>) -> Self {
        Self { params }
    }
}

/// An authentication session created by the platform for an Authorization
/// Request.
///
/// Session notes written against `id` are visible to the token leg of the
/// same flow.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthenticationSession {
    /// Identifier of the session. Correlates the authorization and token legs.
    pub id: String,

    /// The client the session was created for.
    pub client_id: String,

    /// The client's `state` parameter, if provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Grant type of a token request, as far as the bridge is concerned.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// The Authorization Code grant. The only grant eligible for a `c_nonce`.
    AuthorizationCode,

    /// The Refresh Token grant.
    RefreshToken,

    /// The Client Credentials grant.
    ClientCredentials,

    /// The Pre-Authorized Code grant.
    #[serde(rename = "urn:ietf:params:oauth:grant-type:pre-authorized_code")]
    PreAuthorizedCode,
}

impl GrantType {
    /// Whether the grant is an authorization code exchange.
    #[must_use]
    pub const fn is_authorization_code(self) -> bool {
        matches!(self, Self::AuthorizationCode)
    }
}

/// The resolved context of a token request: the authenticated user, their
/// session, and the client the token is being issued to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenContext {
    /// The authenticated user.
    pub user_id: String,

    /// Identifier of the session created during authorization. Session notes
    /// written by the authorization interceptor are read using this value.
    pub session_id: String,

    /// The client the token is being issued to.
    pub client_id: String,

    /// The `scope` requested, if any.
    pub scope: Option<String>,
}

/// Token Response as defined in [RFC6749], with any extension claims added by
/// the platform or the bridge flattened alongside the standard members.
///
/// [RFC6749]: (https://www.rfc-editor.org/rfc/rfc6749.html#section-5.1)
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TokenResponse {
    /// The access token issued by the authorization server.
    pub access_token: String,

    /// The type of the token issued.
    pub token_type: TokenType,

    /// The lifetime in seconds of the access token.
    pub expires_in: i64,

    /// The refresh token, if issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// The lifetime in seconds of the refresh token, if issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<i64>,

    /// An `OpenID` Connect ID token, if issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// The scope of the access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Additional top-level claims.
    #[serde(flatten)]
    pub other_claims: Map<String, Value>,
}

impl TokenResponse {
    /// Add the Credential Issuer's nonce to the response.
    pub fn set_c_nonce(&mut self, nonce: &NonceResponse) {
        self.other_claims.insert(C_NONCE.to_string(), Value::String(nonce.nonce.clone()));
        self.other_claims
            .insert(C_NONCE_EXPIRES_IN.to_string(), Value::from(nonce.nonce_expires_in));
    }

    /// The `c_nonce` claim, if set.
    #[must_use]
    pub fn c_nonce(&self) -> Option<&str> {
        self.other_claims.get(C_NONCE).and_then(Value::as_str)
    }

    /// The `c_nonce_expires_in` claim, if set.
    #[must_use]
    pub fn c_nonce_expires_in(&self) -> Option<i64> {
        self.other_claims.get(C_NONCE_EXPIRES_IN).and_then(Value::as_i64)
    }
}

/// Access token type as defined in [RFC6749].
///
/// [RFC6749]: (https://www.rfc-editor.org/rfc/rfc6749.html#section-7.1)
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum TokenType {
    /// A bearer token.
    #[default]
    Bearer,
}

/// Request sent to the Credential Issuer's nonce service.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NonceRequest {
    /// The `issuer_state` the nonce is bound to.
    pub issuer_state: String,
}

/// Response returned by the Credential Issuer's nonce service.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    /// The nonce value.
    pub nonce: String,

    /// Lifetime of the nonce, in seconds.
    pub nonce_expires_in: i64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn issuer_state() {
        assert!(IssuerState::new("state-xyz").is_ok());
        assert!(IssuerState::new("").is_err());
        assert!(IssuerState::new("two words").is_err());
        assert!(IssuerState::new("line\r\nbreak").is_err());
        assert!(IssuerState::new("caf\u{e9}").is_err());
        assert!(IssuerState::new("x".repeat(MAX_ISSUER_STATE_LEN)).is_ok());
        assert!(IssuerState::new("x".repeat(MAX_ISSUER_STATE_LEN + 1)).is_err());
    }

    #[test]
    fn query_params() {
        let request = AuthorizationRequest::from_query(
            "response_type=code&client_id=wallet&issuer_state=abc%2D123&issuer_state=ignored&scope=openid+profile",
        )
        .expect("should decode");
        assert_eq!(request.client_id(), Some("wallet"));
        assert_eq!(request.param("scope"), Some("openid profile"));

        let state = request.issuer_state().expect("should be valid").expect("should be present");
        assert_eq!(state.as_str(), "abc-123");
    }

    #[test]
    fn no_issuer_state() {
        let request = AuthorizationRequest::from_query("response_type=code&client_id=wallet")
            .expect("should decode");
        assert_eq!(request.issuer_state().expect("should be valid"), None);
    }

    #[test]
    fn malformed_escape() {
        let request = AuthorizationRequest::from_query("a=100%&b=%zz").expect("should decode");
        assert_eq!(request.param("a"), Some("100%"));
        assert_eq!(request.param("b"), Some("%zz"));
    }

    #[test]
    fn nonce_wire_format() {
        let request = NonceRequest { issuer_state: "state-xyz".into() };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"issuerState": "state-xyz"}));

        let response: NonceResponse =
            serde_json::from_value(json!({"nonce": "abc123", "nonceExpiresIn": 300})).unwrap();
        assert_eq!(response, NonceResponse { nonce: "abc123".into(), nonce_expires_in: 300 });
    }

    // Tokens are only ever issued as bearer tokens.
    #[test]
    fn token_type() {
        assert_eq!(serde_json::to_value(TokenType::default()).unwrap(), json!("Bearer"));
        assert!(serde_json::from_value::<TokenType>(json!("DPoP")).is_err());
    }

    #[test]
    fn augmented_token_response() {
        let mut response = TokenResponse {
            access_token: "at".into(),
            expires_in: 300,
            scope: Some("openid".into()),
            ..TokenResponse::default()
        };
        response.set_c_nonce(&NonceResponse { nonce: "abc123".into(), nonce_expires_in: 300 });

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "access_token": "at",
                "token_type": "Bearer",
                "expires_in": 300,
                "scope": "openid",
                "c_nonce": "abc123",
                "c_nonce_expires_in": 300
            })
        );
    }
}
