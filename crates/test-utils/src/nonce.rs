//! # Nonce Services
//!
//! Stand-ins for the Credential Issuer's nonce service: [`ScriptedNonces`]
//! answers in-process, [`NonceServer`] serves the nonce endpoint over HTTP so
//! the bridge's HTTP client can be exercised end to end.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use credibil_vci_bridge::client::{self, NONCES_PATH};
use credibil_vci_bridge::provider::NonceService;
use credibil_vci_bridge::{NonceRequest, NonceResponse};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Lifetime, in seconds, of nonces issued by the stand-in services.
pub const NONCE_EXPIRES_IN: i64 = 300;

/// The nonce the stand-in services issue for `issuer_state`.
#[must_use]
pub fn nonce_for(issuer_state: &str) -> String {
    format!("nonce-{issuer_state}")
}

/// A request received by a stand-in nonce service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Received {
    /// The bearer token the request was authorized with.
    pub bearer_token: String,

    /// The request body.
    pub body: Value,
}

/// An in-process nonce service.
#[derive(Clone, Debug, Default)]
pub struct ScriptedNonces {
    received: Arc<Mutex<Vec<(String, String)>>>,
    reject: Option<StatusCode>,
}

impl ScriptedNonces {
    /// A service issuing [`nonce_for`] each `issuer_state`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A service rejecting every request with `status`.
    #[must_use]
    pub fn rejecting(status: StatusCode) -> Self {
        Self { reject: Some(status), ..Self::default() }
    }

    /// The `(bearer_token, issuer_state)` pairs requested so far.
    #[must_use]
    pub fn received(&self) -> Vec<(String, String)> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl NonceService for ScriptedNonces {
    async fn request_nonce(
        &self, bearer_token: &str, issuer_state: &str,
    ) -> Result<NonceResponse, client::Error> {
        if let Ok(mut received) = self.received.lock() {
            received.push((bearer_token.to_string(), issuer_state.to_string()));
        }
        if let Some(status) = self.reject {
            return Err(client::Error::Rejected(status));
        }
        Ok(NonceResponse { nonce: nonce_for(issuer_state), nonce_expires_in: NONCE_EXPIRES_IN })
    }
}

/// How a [`NonceServer`] responds.
#[derive(Clone, Debug)]
pub enum Behavior {
    /// Issue [`nonce_for`] the requested `issuerState`.
    Echo,

    /// Issue the same nonce for every request.
    Fixed {
        /// The nonce.
        nonce: String,

        /// Its lifetime, in seconds.
        expires_in: i64,
    },

    /// Respond with the status code and no nonce.
    Status(StatusCode),

    /// Respond `200 OK` with a body that is not a nonce response.
    Malformed,
}

#[derive(Clone)]
struct AppState {
    behavior: Behavior,
    received: Arc<Mutex<Vec<Received>>>,
}

/// A nonce service listening on an ephemeral local port. The server is shut
/// down when dropped.
#[derive(Debug)]
pub struct NonceServer {
    base_url: String,
    received: Arc<Mutex<Vec<Received>>>,
    handle: JoinHandle<()>,
}

impl NonceServer {
    /// Start a server responding as `behavior` describes.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn start(behavior: Behavior) -> Result<Self> {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = AppState { behavior, received: Arc::clone(&received) };

        let router =
            Router::new().route(&format!("/{NONCES_PATH}"), post(nonces)).with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("nonce server stopped: {e}");
            }
        });

        Ok(Self { base_url: format!("http://{addr}"), received, handle })
    }

    /// Base URL of the server, suitable for the bridge's configuration.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests received so far.
    #[must_use]
    pub fn received(&self) -> Vec<Received> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Drop for NonceServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn nonces(
    State(state): State<AppState>, TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(body): Json<Value>,
) -> Response {
    if let Ok(mut received) = state.received.lock() {
        received.push(Received { bearer_token: auth.token().to_string(), body: body.clone() });
    }

    match state.behavior {
        Behavior::Echo => {
            let Ok(request) = serde_json::from_value::<NonceRequest>(body) else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            Json(NonceResponse {
                nonce: nonce_for(&request.issuer_state),
                nonce_expires_in: NONCE_EXPIRES_IN,
            })
            .into_response()
        }
        Behavior::Fixed { nonce, expires_in } => {
            Json(NonceResponse { nonce, nonce_expires_in: expires_in }).into_response()
        }
        Behavior::Status(status) => (status, "nonce unavailable").into_response(),
        Behavior::Malformed => (StatusCode::OK, "<html>not a nonce</html>").into_response(),
    }
}
