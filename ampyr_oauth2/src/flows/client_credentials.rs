use std::sync::Arc;

use ampyr_cache::CacheManager;
use async_trait::async_trait;

use super::{FlowEngine, FlowKind, Grant};
use crate::{
    config::require, transport::dto::TokenRequest, AuthConfig, ClientId, ClientSecret,
    ConfigError, FlowError, RefreshTokenRef, Scope, TokenRecord, TokenTransport,
};

/// The client credentials grant: the application authenticates as itself
///
/// No user is involved and no refresh token is used; an expired token is
/// always re-acquired with the client's credentials.
#[derive(Debug)]
pub struct ClientCredentialsGrant {
    client_id: ClientId,
    client_secret: ClientSecret,
    scope: Option<Scope>,
}

impl ClientCredentialsGrant {
    fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        const KIND: FlowKind = FlowKind::ClientCredentials;
        Ok(Self {
            client_id: require(config.client_id(), KIND, "client_id")?.to_owned(),
            client_secret: require(config.client_secret(), KIND, "client_secret")?.to_owned(),
            scope: config.scope().map(ToOwned::to_owned),
        })
    }
}

#[async_trait]
impl Grant for ClientCredentialsGrant {
    const KIND: FlowKind = FlowKind::ClientCredentials;

    async fn full_exchange(&self) -> Result<TokenRequest, FlowError> {
        Ok(TokenRequest::ClientCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scope: self.scope.clone(),
        })
    }

    fn refresh_exchange(&self, _: &RefreshTokenRef) -> Option<TokenRequest> {
        None
    }
}

/// A flow using the client credentials grant
pub type ClientCredentialsFlow<C = ampyr_clock::System> = FlowEngine<ClientCredentialsGrant, C>;

impl ClientCredentialsFlow {
    /// Constructs the flow, failing if the client ID, client secret, or
    /// token endpoint is missing
    pub fn new(
        config: AuthConfig,
        cache: Arc<dyn CacheManager<TokenRecord>>,
        transport: Arc<dyn TokenTransport>,
    ) -> Result<Self, ConfigError> {
        let grant = ClientCredentialsGrant::from_config(&config)?;
        let token_url = require(
            config.url_for_token(),
            FlowKind::ClientCredentials,
            "url_for_token",
        )?
        .clone();

        Ok(Self::from_parts(
            grant,
            Arc::new(config),
            token_url,
            cache,
            transport,
        ))
    }
}
