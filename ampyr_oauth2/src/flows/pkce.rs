use std::sync::Arc;

use ampyr_cache::CacheManager;
use async_trait::async_trait;

use super::{authorization_code::RedirectClient, FlowEngine, FlowKind, Grant};
use crate::{
    config::require, transport::dto::TokenRequest, AuthConfig, AuthorizationPrompt, ConfigError,
    FlowError, PkceChallenge, RefreshTokenRef, TokenRecord, TokenTransport,
};

/// The authorization code grant with a proof key, for public clients
///
/// A fresh verifier is generated for every authorization. Its challenge is
/// sent to the authorization endpoint and the verifier itself to the token
/// endpoint. No client secret is ever sent.
#[derive(Debug)]
pub struct PkceGrant {
    client: RedirectClient,
}

#[async_trait]
impl Grant for PkceGrant {
    const KIND: FlowKind = FlowKind::Pkce;

    async fn full_exchange(&self) -> Result<TokenRequest, FlowError> {
        let pkce = PkceChallenge::generate();
        let code = self.client.authorize(Some(&pkce)).await?;

        Ok(TokenRequest::AuthorizationCode {
            code,
            redirect_uri: self.client.redirect_uri.clone(),
            client_id: self.client.client_id.clone(),
            client_secret: None,
            code_verifier: Some(pkce.into_verifier()),
        })
    }

    fn refresh_exchange(&self, refresh_token: &RefreshTokenRef) -> Option<TokenRequest> {
        Some(TokenRequest::RefreshToken {
            refresh_token: refresh_token.to_owned(),
            client_id: self.client.client_id.clone(),
            client_secret: None,
            scope: self.client.scope.clone(),
        })
    }
}

/// A flow using the authorization code grant with PKCE
pub type PkceFlow<C = ampyr_clock::System> = FlowEngine<PkceGrant, C>;

impl PkceFlow {
    /// Constructs the flow, failing if the client ID, authorization
    /// endpoint, token endpoint, or redirect URL is missing
    pub fn new(
        config: AuthConfig,
        cache: Arc<dyn CacheManager<TokenRecord>>,
        transport: Arc<dyn TokenTransport>,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Result<Self, ConfigError> {
        let grant = PkceGrant {
            client: RedirectClient::from_config(&config, FlowKind::Pkce, prompt)?,
        };
        let token_url = require(config.url_for_token(), FlowKind::Pkce, "url_for_token")?.clone();

        Ok(Self::from_parts(
            grant,
            Arc::new(config),
            token_url,
            cache,
            transport,
        ))
    }
}
