//! # Authorization Server
//!
//! A (naive) HTTP authorization server with the bridge registered for its
//! `OpenID4VCI` login protocols. Every authorization request is logged in as
//! [`DEMO_USER`] without prompting.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use credibil_vci_bridge::http::IntoHttp;
use credibil_vci_bridge::{
    AuthorizationRequest, Error, GrantType, IssuerClient, ProtocolContext, ProtocolService,
    Registry, TokenResponse,
};
use serde_json::Value;
use test_utils::Platform;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// The user authorization requests are logged in as.
pub const DEMO_USER: &str = "normal-user";

type Service = ProtocolService<Platform, IssuerClient>;

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry<Platform, IssuerClient>>,
    platform: Platform,
    client: IssuerClient,
}

impl AppState {
    fn service(&self, protocol: &str) -> Option<Service> {
        let context = ProtocolContext::new(self.platform.clone(), self.client.clone());
        self.registry.service(protocol, context)
    }
}

/// Serve the authorization server on `addr`, returning the bound address and
/// the server's task.
///
/// # Errors
///
/// Returns an error if `addr` cannot be bound.
pub async fn serve(
    addr: &str, platform: Platform, client: IssuerClient,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let state = AppState { registry: Arc::new(Registry::with_bridge()), platform, client };

    let router = Router::new()
        .route("/realms/{realm}/protocol/{protocol}/auth", get(authorize))
        .route("/realms/{realm}/protocol/{protocol}/token", post(token))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store"),
        ))
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("listening on {local_addr}");

    let jh = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("server stopped: {e}");
        }
    });

    Ok((local_addr, jh))
}

/// Authorize endpoint
/// RFC 6749: https://tools.ietf.org/html/rfc6749#section-4.1.2
///
/// The authorization server issues an authorization code and delivers it to the
/// client by adding the response parameters to the query component of the
/// redirection URI using the "application/x-www-form-urlencoded" format.
#[axum::debug_handler]
async fn authorize(
    State(state): State<AppState>, Path((realm, protocol)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Response {
    tracing::debug!(%realm, %protocol, "authorization request");

    let Some(service) = state.service(&protocol) else {
        return unknown_protocol(&protocol);
    };
    let request = match AuthorizationRequest::from_query(query.as_deref().unwrap_or_default()) {
        Ok(request) => request,
        Err(e) => return (e.status(), Json(e)).into_response(),
    };
    let Some(redirect_uri) = request.param("redirect_uri") else {
        let e = Error::InvalidRequest("`redirect_uri` is missing".into());
        return (e.status(), Json(e)).into_response();
    };

    // errors are returned to the client in the redirect
    let mut params = match authorize_code(&state, &service, &request).await {
        Ok(code) => vec![("code".to_string(), code)],
        Err(e) => error_params(&e),
    };
    if let Some(client_state) = request.state() {
        params.push(("state".to_string(), client_state.to_string()));
    }

    // the redirect URI may already carry a query of its own
    let sep = if redirect_uri.contains('?') { '&' } else { '?' };
    match serde_urlencoded::to_string(&params) {
        Ok(qs) => {
            (StatusCode::FOUND, Redirect::to(&format!("{redirect_uri}{sep}{qs}"))).into_response()
        }
        Err(e) => {
            let e = Error::ServerError(format!("issue encoding redirect: {e}"));
            (e.status(), Json(e)).into_response()
        }
    }
}

async fn authorize_code(
    state: &AppState, service: &Service, request: &AuthorizationRequest,
) -> Result<String, Error> {
    let session = service.auth().create_session(request).await?;

    // log the demo user in
    let code = state.platform.issue_code(&session, DEMO_USER, request.param("scope"))?;
    Ok(code)
}

fn error_params(err: &Error) -> Vec<(String, String)> {
    let Ok(Value::Object(map)) = serde_json::to_value(err) else {
        return vec![("error".to_string(), "server_error".to_string())];
    };
    map.into_iter().filter_map(|(k, v)| v.as_str().map(|v| (k, v.to_string()))).collect()
}

/// Token endpoint
/// RFC 6749: https://tools.ietf.org/html/rfc6749#section-4.1.3
#[axum::debug_handler]
async fn token(
    State(state): State<AppState>, Path((realm, protocol)): Path<(String, String)>,
    Form(form): Form<Vec<(String, String)>>,
) -> Response {
    tracing::debug!(%realm, %protocol, "token request");

    let Some(service) = state.service(&protocol) else {
        return unknown_protocol(&protocol);
    };
    exchange(&state, &service, &form).await.into_http().into_response()
}

async fn exchange(
    state: &AppState, service: &Service, form: &[(String, String)],
) -> Result<TokenResponse, Error> {
    let param = |name: &str| form.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());

    match param("grant_type") {
        Some("authorization_code") => {}
        Some(other) => return Err(Error::UnsupportedGrantType(format!("`{other}`"))),
        None => return Err(Error::InvalidRequest("`grant_type` is missing".into())),
    }
    let Some(code) = param("code") else {
        return Err(Error::InvalidRequest("`code` is missing".into()));
    };

    let context = state.platform.exchange_code(code)?;
    if param("client_id").is_some_and(|client_id| client_id != context.client_id) {
        return Err(Error::InvalidGrant("code was issued to another client".into()));
    }

    service.token().create_token_response(&context, GrantType::AuthorizationCode).await
}

fn unknown_protocol(protocol: &str) -> Response {
    let e = Error::InvalidRequest(format!("unknown protocol `{protocol}`"));
    (StatusCode::NOT_FOUND, Json(e)).into_response()
}
