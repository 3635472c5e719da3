//! # In-Memory Platform
//!
//! A (naive) authorization server platform for tests and demos. It creates
//! authentication sessions, issues authorization codes, and mints
//! deterministic tokens so responses can be compared field by field.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use credibil_vci_bridge::provider::{Authorization, SessionNotes, TokenIssuance};
use credibil_vci_bridge::{
    AuthenticationSession, AuthorizationRequest, Error, GrantType, TokenContext, TokenResponse,
    TokenType,
};
use serde_json::Value;

const ACCESS_TOKEN_TTL: i64 = 300;
const REFRESH_TOKEN_TTL: i64 = 1800;
const AUTH_CODE_TTL: i64 = 60;

/// State persisted between steps of a flow.
#[derive(Clone, Debug)]
pub struct State<T> {
    /// Body holds data relevant to the current state.
    pub body: T,

    /// Time state should expire.
    pub expires_at: DateTime<Utc>,
}

impl<T> State<T> {
    /// Determines whether state has expired or not.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.signed_duration_since(Utc::now()).num_seconds() < 0
    }
}

/// In-memory platform.
#[derive(Clone, Debug, Default)]
pub struct Platform {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    notes: Mutex<HashMap<String, String>>,
    codes: Mutex<HashMap<String, State<TokenContext>>>,
    sessions_created: AtomicUsize,
}

impl Platform {
    /// Create an empty platform.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of authentication sessions created so far.
    #[must_use]
    pub fn sessions_created(&self) -> usize {
        self.inner.sessions_created.load(Ordering::SeqCst)
    }

    /// Issue an authorization code once `user_id` has logged in against
    /// `session`.
    ///
    /// # Errors
    ///
    /// Returns an error if the code store cannot be locked.
    pub fn issue_code(
        &self, session: &AuthenticationSession, user_id: &str, scope: Option<&str>,
    ) -> Result<String> {
        let code = uuid::Uuid::new_v4().to_string();
        let state = State {
            body: TokenContext {
                user_id: user_id.to_string(),
                session_id: session.id.clone(),
                client_id: session.client_id.clone(),
                scope: scope.map(ToString::to_string),
            },
            expires_at: Utc::now() + Duration::seconds(AUTH_CODE_TTL),
        };
        let mut codes = self.inner.codes.lock().map_err(|_| anyhow!("issue locking"))?;
        codes.insert(code.clone(), state);
        Ok(code)
    }

    /// Exchange an authorization code for the context it was issued in. Codes
    /// can only be used once.
    ///
    /// # Errors
    ///
    /// Returns an `invalid_grant` error if the code is unknown, already used,
    /// or expired.
    pub fn exchange_code(&self, code: &str) -> Result<TokenContext> {
        let state = self.inner.codes.lock().map_err(|_| anyhow!("issue locking"))?.remove(code);
        let Some(state) = state else {
            return Err(Error::InvalidGrant("invalid authorization code".to_string()).into());
        };
        if state.is_expired() {
            return Err(Error::InvalidGrant("authorization code expired".to_string()).into());
        }
        Ok(state.body)
    }

    /// Mint a token response exactly as the platform would, without the
    /// bridge.
    #[must_use]
    pub fn baseline(context: &TokenContext, grant_type: GrantType) -> TokenResponse {
        let refresh = matches!(grant_type, GrantType::AuthorizationCode | GrantType::RefreshToken);
        let (session_id, user_id) = (&context.session_id, &context.user_id);

        let mut response = TokenResponse {
            access_token: format!("{session_id}.{user_id}.access"),
            token_type: TokenType::Bearer,
            expires_in: ACCESS_TOKEN_TTL,
            refresh_token: refresh.then(|| format!("{session_id}.{user_id}.refresh")),
            refresh_expires_in: refresh.then_some(REFRESH_TOKEN_TTL),
            id_token: None,
            scope: Some(context.scope.clone().unwrap_or_else(|| "openid".to_string())),
            other_claims: serde_json::Map::new(),
        };
        response.other_claims.insert("session_state".into(), Value::from(session_id.clone()));
        response.other_claims.insert("not-before-policy".into(), Value::from(0));
        response
    }
}

impl SessionNotes for Platform {
    async fn get_note(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        let key = format!("{session_id}-{key}");
        let notes = self.inner.notes.lock().map_err(|_| anyhow!("issue locking"))?;
        Ok(notes.get(&key).cloned())
    }

    async fn set_note(&self, session_id: &str, key: &str, value: &str) -> Result<()> {
        let key = format!("{session_id}-{key}");
        let mut notes = self.inner.notes.lock().map_err(|_| anyhow!("issue locking"))?;
        notes.insert(key, value.to_string());
        Ok(())
    }
}

impl Authorization for Platform {
    async fn create_session(
        &self, request: &AuthorizationRequest,
    ) -> Result<AuthenticationSession> {
        let Some(client_id) = request.client_id() else {
            return Err(Error::InvalidRequest("`client_id` is missing".to_string()).into());
        };
        if request.param("response_type") != Some("code") {
            return Err(Error::InvalidRequest("unsupported `response_type`".to_string()).into());
        }

        self.inner.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(AuthenticationSession {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: client_id.to_string(),
            state: request.state().map(ToString::to_string),
        })
    }
}

impl TokenIssuance for Platform {
    async fn create_token_response(
        &self, context: &TokenContext, grant_type: GrantType,
    ) -> Result<TokenResponse> {
        if context.client_id.is_empty() {
            return Err(Error::InvalidClient("unknown client".to_string()).into());
        }
        if grant_type == GrantType::PreAuthorizedCode {
            return Err(Error::UnsupportedGrantType("pre-authorized_code".to_string()).into());
        }
        Ok(Self::baseline(context, grant_type))
    }
}
