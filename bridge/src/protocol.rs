//! # Protocol Registration
//!
//! A host authorization server serves each login protocol through the
//! factory registered for the protocol's identifier. When more than one
//! factory is registered for an identifier, the one with the highest `order`
//! is used. [`BridgeFactory`] is registered with an order higher than the
//! platform's own [`PlatformFactory`] so the bridge's interceptors replace the
//! stock authorization and token endpoints.
//!
//! Factories hold no protocol state: each request builds a fresh
//! [`ProtocolService`] from the request's [`ProtocolContext`].

use std::fmt::{self, Display};

use crate::handlers::{AuthorizationInterceptor, Result, TokenInterceptor};
use crate::provider::{Authorization, NonceService, Provider, TokenIssuance};
use crate::types::{
    AuthenticationSession, AuthorizationRequest, GrantType, TokenContext, TokenResponse,
};

/// Order of the platform's default factory.
pub const DEFAULT_ORDER: i32 = 0;

/// Order of the bridge's factory. Takes precedence over the default.
pub const BRIDGE_ORDER: i32 = 1;

/// Protocols served by the bridge. Both identifiers share a single
/// implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// `OpenID` for Verifiable Credential Issuance.
    #[default]
    Oid4vci,

    /// `OpenID` Connect for Verifiable Credentials.
    Oidc4vc,
}

impl Protocol {
    /// The protocol's identifier.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Oid4vci => "oid4vci",
            Self::Oidc4vc => "oidc4vc",
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Context of the current request: the platform's provider, holding its
/// session, event and token manager state, and the nonce service client
/// shared across requests.
#[derive(Clone, Debug)]
pub struct ProtocolContext<P, N> {
    /// The platform.
    pub provider: P,

    /// The Credential Issuer's nonce service.
    pub nonce_service: N,
}

impl<P, N> ProtocolContext<P, N> {
    /// Create a request context.
    #[must_use]
    pub const fn new(provider: P, nonce_service: N) -> Self {
        Self { provider, nonce_service }
    }
}

/// Creates the endpoints for a protocol.
pub trait ProtocolFactory<P, N>: Send + Sync {
    /// Identifier of the protocol served.
    fn id(&self) -> &str;

    /// Precedence of the factory. Higher values win.
    fn order(&self) -> i32 {
        DEFAULT_ORDER
    }

    /// Create the protocol's endpoints for the current request.
    fn create(&self, context: ProtocolContext<P, N>) -> ProtocolService<P, N>;
}

/// The platform's stock endpoints: requests are passed straight through to
/// the platform.
#[derive(Clone, Debug)]
pub struct PlatformFactory {
    id: String,
}

impl PlatformFactory {
    /// Create a default factory for the protocol identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl<P, N> ProtocolFactory<P, N> for PlatformFactory {
    fn id(&self) -> &str {
        &self.id
    }

    fn create(&self, context: ProtocolContext<P, N>) -> ProtocolService<P, N> {
        ProtocolService { context, intercept: false }
    }
}

/// The bridge's endpoints: authorization and token requests are intercepted.
#[derive(Clone, Copy, Debug, Default)]
pub struct BridgeFactory {
    protocol: Protocol,
}

impl BridgeFactory {
    /// Create a factory serving `protocol`.
    #[must_use]
    pub const fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }
}

impl<P, N> ProtocolFactory<P, N> for BridgeFactory {
    fn id(&self) -> &str {
        self.protocol.id()
    }

    fn order(&self) -> i32 {
        BRIDGE_ORDER
    }

    fn create(&self, context: ProtocolContext<P, N>) -> ProtocolService<P, N> {
        ProtocolService { context, intercept: true }
    }
}

/// The authorization and token endpoints of a protocol for one request.
#[derive(Clone, Debug)]
pub struct ProtocolService<P, N> {
    context: ProtocolContext<P, N>,
    intercept: bool,
}

impl<P: Clone, N: Clone> ProtocolService<P, N> {
    /// Whether the service intercepts the platform's endpoints.
    #[must_use]
    pub const fn intercepts(&self) -> bool {
        self.intercept
    }

    /// The authorization endpoint.
    #[must_use]
    pub fn auth(&self) -> AuthEndpoint<P> {
        let provider = self.context.provider.clone();
        if self.intercept {
            AuthEndpoint::Bridge(AuthorizationInterceptor::new(provider))
        } else {
            AuthEndpoint::Platform(provider)
        }
    }

    /// The token endpoint.
    #[must_use]
    pub fn token(&self) -> TokenEndpoint<P, N> {
        let provider = self.context.provider.clone();
        if self.intercept {
            TokenEndpoint::Bridge(TokenInterceptor::new(
                provider,
                self.context.nonce_service.clone(),
            ))
        } else {
            TokenEndpoint::Platform(provider)
        }
    }
}

/// An authorization endpoint selected by the registry.
#[derive(Clone, Debug)]
pub enum AuthEndpoint<P> {
    /// The platform's own endpoint.
    Platform(P),

    /// The bridge's interceptor.
    Bridge(AuthorizationInterceptor<P>),
}

impl<P: Provider> AuthEndpoint<P> {
    /// Create the authentication session for the request.
    ///
    /// # Errors
    ///
    /// Returns the endpoint's error unchanged.
    pub async fn create_session(
        &self, request: &AuthorizationRequest,
    ) -> Result<AuthenticationSession> {
        match self {
            Self::Platform(provider) => {
                Ok(Authorization::create_session(provider, request).await?)
            }
            Self::Bridge(interceptor) => interceptor.create_session(request).await,
        }
    }
}

/// A token endpoint selected by the registry.
#[derive(Clone, Debug)]
pub enum TokenEndpoint<P, N> {
    /// The platform's own endpoint.
    Platform(P),

    /// The bridge's interceptor.
    Bridge(TokenInterceptor<P, N>),
}

impl<P: Provider, N: NonceService> TokenEndpoint<P, N> {
    /// Create the token response.
    ///
    /// # Errors
    ///
    /// Returns the endpoint's error unchanged.
    pub async fn create_token_response(
        &self, context: &TokenContext, grant_type: GrantType,
    ) -> Result<TokenResponse> {
        match self {
            Self::Platform(provider) => {
                Ok(TokenIssuance::create_token_response(provider, context, grant_type).await?)
            }
            Self::Bridge(interceptor) => {
                interceptor.create_token_response(context, grant_type).await
            }
        }
    }
}

/// The factories known to the host, by protocol identifier.
pub struct Registry<P, N> {
    factories: Vec<Box<dyn ProtocolFactory<P, N>>>,
}

impl<P, N> Default for Registry<P, N> {
    fn default() -> Self {
        Self { factories: Vec::new() }
    }
}

impl<P, N> fmt::Debug for Registry<P, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<(&str, i32)> =
            self.factories.iter().map(|fac| (fac.id(), fac.order())).collect();
        f.debug_struct("Registry").field("factories", &entries).finish()
    }
}

impl<P, N> Registry<P, N> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory.
    pub fn register(&mut self, factory: impl ProtocolFactory<P, N> + 'static) -> &mut Self {
        tracing::debug!(id = factory.id(), order = factory.order(), "registering protocol");
        self.factories.push(Box::new(factory));
        self
    }

    /// The factory serving protocol `id`: the registered factory with the
    /// highest order. Of factories with equal order, the first registered is
    /// used.
    #[must_use]
    pub fn factory(&self, id: &str) -> Option<&dyn ProtocolFactory<P, N>> {
        let mut selected: Option<&dyn ProtocolFactory<P, N>> = None;
        for factory in self.factories.iter().filter(|f| f.id() == id) {
            if selected.is_none_or(|s| factory.order() > s.order()) {
                selected = Some(factory.as_ref());
            }
        }
        selected
    }

    /// Create the endpoints for protocol `id` for the current request.
    #[must_use]
    pub fn service(
        &self, id: &str, context: ProtocolContext<P, N>,
    ) -> Option<ProtocolService<P, N>> {
        self.factory(id).map(|factory| factory.create(context))
    }
}

impl<P: 'static, N: 'static> Registry<P, N> {
    /// A registry serving both bridge protocols, each registered alongside the
    /// platform's default so precedence decides which is used.
    #[must_use]
    pub fn with_bridge() -> Self {
        let mut registry = Self::new();
        for protocol in [Protocol::Oid4vci, Protocol::Oidc4vc] {
            registry.register(PlatformFactory::new(protocol.id()));
            registry.register(BridgeFactory::new(protocol));
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_order_wins() {
        let mut registry = Registry::<(), ()>::new();
        registry.register(BridgeFactory::new(Protocol::Oid4vci));
        registry.register(PlatformFactory::new("oid4vci"));

        let factory = registry.factory("oid4vci").expect("should resolve");
        assert_eq!(factory.order(), BRIDGE_ORDER);

        let service = registry.service("oid4vci", ProtocolContext::new((), ())).unwrap();
        assert!(service.intercepts());
    }

    #[test]
    fn first_registered_on_tie() {
        let mut registry = Registry::<(), ()>::new();
        registry.register(PlatformFactory::new("openid-connect"));
        registry.register(PlatformFactory::new("openid-connect"));
        registry.register(BridgeFactory::new(Protocol::Oidc4vc));

        let factory = registry.factory("openid-connect").expect("should resolve");
        assert_eq!(factory.order(), DEFAULT_ORDER);
        assert!(registry.factory("saml").is_none());
    }

    #[test]
    fn both_protocols() {
        let registry = Registry::<(), ()>::with_bridge();
        for protocol in [Protocol::Oid4vci, Protocol::Oidc4vc] {
            let context = ProtocolContext::new((), ());
            let service = registry.service(protocol.id(), context).expect("should resolve");
            assert!(service.intercepts());
        }
    }
}
