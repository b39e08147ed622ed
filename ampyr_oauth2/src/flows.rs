//! OAuth2 flows
//!
//! Each flow acquires access tokens for one grant type behind the common
//! [`OAuth2Flow`] contract. Network-backed flows share the state machine in
//! [`FlowEngine`]:
//!
//! * `NoToken`: nothing cached, so a full exchange is performed.
//! * `Valid`: the cached token is returned without contacting the authority.
//! * `Expired`: the cached token is refreshed if it carries a refresh token
//!   and the grant supports refreshing, and is fully re-acquired otherwise.

use std::{fmt, sync::Arc};

use ampyr_cache::{CacheError, CacheManager, NullCache};
use ampyr_clock::{Clock, System};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    AccessToken, AccessTokenRef, AuthConfig, AuthorizationPrompt, ConfigError, ConsolePrompt,
    FlowError, ReqwestTransport, TokenLifetimeConfig, TokenRecord, TokenTransport,
};

mod authorization_code;
mod client_credentials;
mod engine;
mod null;
mod pkce;
#[cfg(test)]
mod testing;

pub use authorization_code::{AuthorizationCodeFlow, AuthorizationCodeGrant};
pub use client_credentials::{ClientCredentialsFlow, ClientCredentialsGrant};
pub use engine::{FlowEngine, Grant};
pub use null::{NullFlow, NULL_TOKEN};
pub use pkce::{PkceFlow, PkceGrant};

/// Acquires access tokens for one OAuth2 grant type
#[async_trait]
pub trait OAuth2Flow: Send + Sync {
    /// The grant type implemented
    fn kind(&self) -> FlowKind;

    /// The configuration the flow was built from
    fn auth_config(&self) -> &AuthConfig;

    /// Returns a usable access token
    async fn acquire(&self) -> Result<Acquisition, FlowError>;
}

/// The supported OAuth2 grant types
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// No authorization; a constant sentinel token
    #[default]
    Null,
    /// The authorization code grant
    AuthorizationCode,
    /// The client credentials grant
    ClientCredentials,
    /// The authorization code grant with a proof key
    Pkce,
}

impl FlowKind {
    /// The tag identifying this flow in cache keys
    pub fn type_tag(self) -> &'static str {
        match self {
            Self::Null => "NullFlow",
            Self::AuthorizationCode => "AuthorizationCodeFlow",
            Self::ClientCredentials => "ClientCredentialsFlow",
            Self::Pkce => "PkceFlow",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "null",
            Self::AuthorizationCode => "authorization code",
            Self::ClientCredentials => "client credentials",
            Self::Pkce => "PKCE",
        })
    }
}

/// A flow's token state as derived from the cache
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenState {
    /// No token is cached
    NoToken,
    /// A cached token is still valid
    Valid(TokenRecord),
    /// The cached token has expired
    Expired(TokenRecord),
}

/// Where an acquired access token came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenOrigin {
    /// The constant token of a flow that needs no authorization
    Sentinel,
    /// A still-valid cached token
    Cache,
    /// A full exchange with the token endpoint
    Exchange,
    /// A refresh of an expired cached token
    Refresh,
}

/// The outcome of a successful [`OAuth2Flow::acquire`]
#[derive(Debug)]
pub struct Acquisition {
    access_token: AccessToken,
    origin: TokenOrigin,
    persist_error: Option<CacheError>,
}

impl Acquisition {
    pub(crate) fn new(
        access_token: AccessToken,
        origin: TokenOrigin,
        persist_error: Option<CacheError>,
    ) -> Self {
        Self {
            access_token,
            origin,
            persist_error,
        }
    }

    /// The access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Where the token came from
    #[inline]
    pub fn origin(&self) -> TokenOrigin {
        self.origin
    }

    /// The error encountered caching a newly obtained token, if any
    ///
    /// The token is usable regardless, but later calls will need to
    /// obtain a new one.
    #[inline]
    pub fn persist_error(&self) -> Option<&CacheError> {
        self.persist_error.as_ref()
    }

    /// Takes the access token
    #[inline]
    pub fn into_access_token(self) -> AccessToken {
        self.access_token
    }
}

/// Any of the supported flows, selected at construction
#[derive(Debug)]
pub enum Flow<C = System> {
    /// See [`NullFlow`]
    Null(NullFlow),
    /// See [`AuthorizationCodeFlow`]
    AuthorizationCode(AuthorizationCodeFlow<C>),
    /// See [`ClientCredentialsFlow`]
    ClientCredentials(ClientCredentialsFlow<C>),
    /// See [`PkceFlow`]
    Pkce(PkceFlow<C>),
}

#[async_trait]
impl<C: Clock + Send + Sync> OAuth2Flow for Flow<C> {
    fn kind(&self) -> FlowKind {
        match self {
            Self::Null(f) => f.kind(),
            Self::AuthorizationCode(f) => f.kind(),
            Self::ClientCredentials(f) => f.kind(),
            Self::Pkce(f) => f.kind(),
        }
    }

    fn auth_config(&self) -> &AuthConfig {
        match self {
            Self::Null(f) => f.auth_config(),
            Self::AuthorizationCode(f) => f.auth_config(),
            Self::ClientCredentials(f) => f.auth_config(),
            Self::Pkce(f) => f.auth_config(),
        }
    }

    async fn acquire(&self) -> Result<Acquisition, FlowError> {
        match self {
            Self::Null(f) => f.acquire().await,
            Self::AuthorizationCode(f) => f.acquire().await,
            Self::ClientCredentials(f) => f.acquire().await,
            Self::Pkce(f) => f.acquire().await,
        }
    }
}

/// Resolves a [`Flow`] from configuration
///
/// Defaults are settled once, when [`build`][Self::build] is called: no
/// cache (every acquisition exchanges), a [`ReqwestTransport`], a
/// [`ConsolePrompt`] for flows that need user authorization, and the
/// default [`TokenLifetimeConfig`].
pub struct FlowBuilder<C = System> {
    config: AuthConfig,
    kind: FlowKind,
    requires_oauth: bool,
    cache: Option<Arc<dyn CacheManager<TokenRecord>>>,
    transport: Option<Arc<dyn TokenTransport>>,
    prompt: Option<Arc<dyn AuthorizationPrompt>>,
    lifetime: TokenLifetimeConfig<C>,
}

impl FlowBuilder<System> {
    /// Starts building a flow from `config`
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            kind: FlowKind::Null,
            requires_oauth: true,
            cache: None,
            transport: None,
            prompt: None,
            lifetime: TokenLifetimeConfig::default(),
        }
    }
}

impl<C> FlowBuilder<C> {
    /// Selects the grant type
    pub fn kind(mut self, kind: FlowKind) -> Self {
        self.kind = kind;
        self
    }

    /// When `false`, builds a [`NullFlow`] regardless of the selected kind
    pub fn requires_oauth(mut self, requires_oauth: bool) -> Self {
        self.requires_oauth = requires_oauth;
        self
    }

    /// Sets the cache tokens are kept in
    pub fn cache(mut self, cache: Arc<dyn CacheManager<TokenRecord>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the transport used for token exchanges
    pub fn transport(mut self, transport: Arc<dyn TokenTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets how users are asked for authorization
    pub fn prompt(mut self, prompt: Arc<dyn AuthorizationPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Sets the token lifetime configuration, including its clock
    pub fn lifetime_config<D>(self, lifetime: TokenLifetimeConfig<D>) -> FlowBuilder<D> {
        FlowBuilder {
            config: self.config,
            kind: self.kind,
            requires_oauth: self.requires_oauth,
            cache: self.cache,
            transport: self.transport,
            prompt: self.prompt,
            lifetime,
        }
    }

    /// The grant type that [`build`][Self::build] will produce
    pub fn resolved_kind(&self) -> FlowKind {
        if self.requires_oauth {
            self.kind
        } else {
            FlowKind::Null
        }
    }

    /// Validates the configuration and constructs the flow
    pub fn build(self) -> Result<Flow<C>, ConfigError> {
        let kind = self.resolved_kind();
        if kind == FlowKind::Null {
            return Ok(Flow::Null(NullFlow::new(self.config)));
        }

        let cache: Arc<dyn CacheManager<TokenRecord>> = match self.cache {
            Some(cache) => cache,
            None => Arc::new(NullCache),
        };
        let transport: Arc<dyn TokenTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::default()),
        };
        let prompt: Arc<dyn AuthorizationPrompt> = match self.prompt {
            Some(prompt) => prompt,
            None => Arc::new(ConsolePrompt),
        };
        let lifetime = self.lifetime;

        Ok(match kind {
            FlowKind::ClientCredentials => Flow::ClientCredentials(
                ClientCredentialsFlow::new(self.config, cache, transport)?
                    .with_lifetime_config(lifetime),
            ),
            FlowKind::AuthorizationCode => Flow::AuthorizationCode(
                AuthorizationCodeFlow::new(self.config, cache, transport, prompt)?
                    .with_lifetime_config(lifetime),
            ),
            FlowKind::Pkce => Flow::Pkce(
                PkceFlow::new(self.config, cache, transport, prompt)?
                    .with_lifetime_config(lifetime),
            ),
            FlowKind::Null => Flow::Null(NullFlow::new(self.config)),
        })
    }
}

impl<C: fmt::Debug> fmt::Debug for FlowBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FlowBuilder")
            .field("config", &self.config)
            .field("kind", &self.kind)
            .field("requires_oauth", &self.requires_oauth)
            .field("cache", &self.cache.is_some())
            .field("transport", &self.transport.is_some())
            .field("prompt", &self.prompt.is_some())
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
