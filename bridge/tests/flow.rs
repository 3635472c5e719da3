//! Authorization Code Flow Tests
//!
//! Drive the authorization and token legs of a flow through the protocol
//! registry, with the nonce service served over HTTP.

use std::sync::Arc;

use credibil_vci_bridge::http::IntoHttp;
use credibil_vci_bridge::protocol::PlatformFactory;
use credibil_vci_bridge::{
    AuthorizationInterceptor, AuthorizationRequest, Config, Error, GrantType, IssuerClient,
    ProtocolContext, Registry, TokenResponse,
};
use http::StatusCode;
use serde_json::{Value, json};
use test_utils::{Behavior, NonceServer, Platform, nonce_for};

const WALLET: &str = "https://wallet.example.com";
const BOB_SUBJECT: &str = "normal-user";

fn context(platform: &Platform, server: &NonceServer) -> ProtocolContext<Platform, IssuerClient> {
    let config = Config::new(server.base_url()).expect("should configure");
    let client = IssuerClient::new(&config).expect("should create client");
    ProtocolContext::new(platform.clone(), client)
}

// Run the authorization leg, log Bob in, and exchange the code.
async fn code_flow(
    registry: &Registry<Platform, IssuerClient>, protocol: &str,
    context: ProtocolContext<Platform, IssuerClient>, query: &str,
) -> Result<TokenResponse, Error> {
    let platform = context.provider.clone();
    let service = registry.service(protocol, context).expect("should serve protocol");

    let request = AuthorizationRequest::from_query(query)?;
    let session = service.auth().create_session(&request).await?;
    let code = platform.issue_code(&session, BOB_SUBJECT, Some("openid"))?;

    let token_context = platform.exchange_code(&code)?;
    service.token().create_token_response(&token_context, GrantType::AuthorizationCode).await
}

// Should return the Credential Issuer's nonce alongside the access token.
#[tokio::test]
async fn issuer_initiated() {
    let behavior = Behavior::Fixed { nonce: "abc123".into(), expires_in: 300 };
    let server = NonceServer::start(behavior).await.expect("should start server");
    let platform = Platform::new();
    let registry = Registry::with_bridge();

    let query = format!("response_type=code&client_id={WALLET}&issuer_state=state-xyz");
    let response = code_flow(&registry, "oid4vci", context(&platform, &server), &query)
        .await
        .expect("should return token");

    // --------------------------------------------------
    // The token response carries the nonce
    // --------------------------------------------------
    let result: Result<TokenResponse, Error> = Ok(response.clone());
    let http_resp = result.into_http();
    assert_eq!(http_resp.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(http_resp.body()).expect("should be json");
    assert_eq!(body["c_nonce"], json!("abc123"));
    assert_eq!(body["c_nonce_expires_in"], json!(300));
    assert_eq!(body["access_token"], json!(response.access_token));
    assert_eq!(body["token_type"], json!("Bearer"));
    assert!(body["session_state"].is_string());

    // --------------------------------------------------
    // The nonce service saw the issuer_state and the new access token
    // --------------------------------------------------
    let received = server.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].bearer_token, response.access_token);
    assert_eq!(received[0].body, json!({"issuerState": "state-xyz"}));
}

// Should serve the bridge under both protocol identifiers.
#[tokio::test]
async fn oidc4vc_protocol() {
    let server = NonceServer::start(Behavior::Echo).await.expect("should start server");
    let platform = Platform::new();
    let registry = Registry::with_bridge();

    let query = format!("response_type=code&client_id={WALLET}&issuer_state=offer-42");
    let response = code_flow(&registry, "oidc4vc", context(&platform, &server), &query)
        .await
        .expect("should return token");

    assert_eq!(response.c_nonce(), Some(nonce_for("offer-42").as_str()));
}

// Should leave ordinary OIDC flows exactly as the platform issues them.
#[tokio::test]
async fn plain_oidc() {
    let server = NonceServer::start(Behavior::Echo).await.expect("should start server");
    let platform = Platform::new();
    let registry = Registry::with_bridge();

    let query = format!("response_type=code&client_id={WALLET}&state=xyz");
    let response = code_flow(&registry, "oid4vci", context(&platform, &server), &query)
        .await
        .expect("should return token");

    let body = serde_json::to_value(&response).expect("should serialize");
    assert!(body.get("c_nonce").is_none());
    assert!(body.get("c_nonce_expires_in").is_none());
    assert!(server.received().is_empty());
}

// Should fail the code exchange when the nonce service errors.
#[tokio::test]
async fn nonce_service_error() {
    let behavior = Behavior::Status(StatusCode::INTERNAL_SERVER_ERROR);
    let server = NonceServer::start(behavior).await.expect("should start server");
    let platform = Platform::new();
    let registry = Registry::with_bridge();

    let query = format!("response_type=code&client_id={WALLET}&issuer_state=state-xyz");
    let result = code_flow(&registry, "oid4vci", context(&platform, &server), &query).await;

    let Err(err @ Error::ServerError(_)) = &result else {
        panic!("should be a server error: {result:?}");
    };
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let http_resp = result.into_http();
    assert_eq!(http_resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_str(http_resp.body()).expect("should be json");
    assert_eq!(body["error"], json!("server_error"));
    assert!(body.get("access_token").is_none());
}

// Should not augment tokens when only the platform's factory is registered.
#[tokio::test]
async fn platform_only() {
    let server = NonceServer::start(Behavior::Echo).await.expect("should start server");
    let platform = Platform::new();
    let mut registry: Registry<Platform, IssuerClient> = Registry::new();
    registry.register(PlatformFactory::new("oid4vci"));

    let query = format!("response_type=code&client_id={WALLET}&issuer_state=state-xyz");
    let response = code_flow(&registry, "oid4vci", context(&platform, &server), &query)
        .await
        .expect("should return token");

    assert!(response.c_nonce().is_none());
    assert!(server.received().is_empty());
    assert!(registry.service("saml", context(&platform, &server)).is_none());
}

// Should keep concurrent flows apart: each token carries the nonce bound to
// its own issuer_state.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_flows() {
    let server = NonceServer::start(Behavior::Echo).await.expect("should start server");
    let platform = Platform::new();
    let registry = Arc::new(Registry::with_bridge());

    let mut handles = Vec::new();
    for i in 0..10 {
        let registry = Arc::clone(&registry);
        let context = context(&platform, &server);
        handles.push(tokio::spawn(async move {
            let issuer_state = format!("state-{i}");
            let query =
                format!("response_type=code&client_id={WALLET}&issuer_state={issuer_state}");
            let response = code_flow(&registry, "oid4vci", context, &query).await;
            (issuer_state, response)
        }));
    }

    for handle in handles {
        let (issuer_state, response) = handle.await.expect("task should complete");
        let response = response.expect("should return token");
        assert_eq!(response.c_nonce(), Some(nonce_for(&issuer_state).as_str()));
    }
    assert_eq!(platform.sessions_created(), 10);
    assert_eq!(server.received().len(), 10);
}

// Should only allow an authorization code to be used once.
#[tokio::test]
async fn code_reuse() {
    let platform = Platform::new();
    let request = AuthorizationRequest::from_query("response_type=code&client_id=wallet")
        .expect("should decode");
    let session = AuthorizationInterceptor::new(platform.clone())
        .create_session(&request)
        .await
        .expect("should create session");

    let code = platform.issue_code(&session, BOB_SUBJECT, None).expect("should issue code");
    platform.exchange_code(&code).expect("should exchange code");

    let err = Error::from(platform.exchange_code(&code).expect_err("should reject reuse"));
    assert_eq!(err, Error::InvalidGrant("invalid authorization code".into()));
}
