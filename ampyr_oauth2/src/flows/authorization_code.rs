use std::{fmt, sync::Arc};

use ampyr_cache::CacheManager;
use async_trait::async_trait;
use url::Url;

use super::{FlowEngine, FlowKind, Grant};
use crate::{
    config::require, transport::dto::TokenRequest, AuthConfig, AuthorizationCode,
    AuthorizationPrompt, AuthorizationRequest, ClientId, ClientSecret, ConfigError, FlowError,
    PkceChallenge, RefreshTokenRef, Scope, TokenRecord, TokenTransport,
};

/// Endpoints and client identity shared by redirect-based grants
pub(super) struct RedirectClient {
    pub(super) client_id: ClientId,
    pub(super) scope: Option<Scope>,
    pub(super) authorize_url: Url,
    pub(super) redirect_uri: Url,
    pub(super) prompt: Arc<dyn AuthorizationPrompt>,
}

impl RedirectClient {
    pub(super) fn from_config(
        config: &AuthConfig,
        kind: FlowKind,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: require(config.client_id(), kind, "client_id")?.to_owned(),
            scope: config.scope().map(ToOwned::to_owned),
            authorize_url: require(config.url_for_oauth(), kind, "url_for_oauth")?.clone(),
            redirect_uri: require(config.url_for_redirect(), kind, "url_for_redirect")?.clone(),
            prompt,
        })
    }

    /// Sends the user through the prompt and returns the verified code
    pub(super) async fn authorize(
        &self,
        pkce: Option<&PkceChallenge>,
    ) -> Result<AuthorizationCode, FlowError> {
        let request = self.authorization_request(pkce);
        tracing::info!(
            client_id = self.client_id.as_str(),
            url = %request.url(),
            "awaiting user authorization"
        );
        let grant = self.prompt.authorize(&request).await?;
        Ok(grant.verify(&request)?)
    }

    fn authorization_request(&self, pkce: Option<&PkceChallenge>) -> AuthorizationRequest {
        AuthorizationRequest::new(
            &self.authorize_url,
            &self.client_id,
            &self.redirect_uri,
            self.scope.as_deref(),
            pkce,
        )
    }
}

impl fmt::Debug for RedirectClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RedirectClient")
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .field("authorize_url", &self.authorize_url.as_str())
            .field("redirect_uri", &self.redirect_uri.as_str())
            .finish()
    }
}

/// The authorization code grant for confidential clients
///
/// The user approves access out of band; the resulting code is exchanged
/// together with the client secret. Expired tokens are refreshed.
#[derive(Debug)]
pub struct AuthorizationCodeGrant {
    client: RedirectClient,
    client_secret: ClientSecret,
}

#[async_trait]
impl Grant for AuthorizationCodeGrant {
    const KIND: FlowKind = FlowKind::AuthorizationCode;

    async fn full_exchange(&self) -> Result<TokenRequest, FlowError> {
        let code = self.client.authorize(None).await?;

        Ok(TokenRequest::AuthorizationCode {
            code,
            redirect_uri: self.client.redirect_uri.clone(),
            client_id: self.client.client_id.clone(),
            client_secret: Some(self.client_secret.clone()),
            code_verifier: None,
        })
    }

    fn refresh_exchange(&self, refresh_token: &RefreshTokenRef) -> Option<TokenRequest> {
        Some(TokenRequest::RefreshToken {
            refresh_token: refresh_token.to_owned(),
            client_id: self.client.client_id.clone(),
            client_secret: Some(self.client_secret.clone()),
            scope: self.client.scope.clone(),
        })
    }
}

/// A flow using the authorization code grant
pub type AuthorizationCodeFlow<C = ampyr_clock::System> = FlowEngine<AuthorizationCodeGrant, C>;

impl AuthorizationCodeFlow {
    /// Constructs the flow, failing if the client ID, client secret,
    /// authorization endpoint, token endpoint, or redirect URL is missing
    pub fn new(
        config: AuthConfig,
        cache: Arc<dyn CacheManager<TokenRecord>>,
        transport: Arc<dyn TokenTransport>,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Result<Self, ConfigError> {
        const KIND: FlowKind = FlowKind::AuthorizationCode;

        let grant = AuthorizationCodeGrant {
            client: RedirectClient::from_config(&config, KIND, prompt)?,
            client_secret: require(config.client_secret(), KIND, "client_secret")?.to_owned(),
        };
        let token_url = require(config.url_for_token(), KIND, "url_for_token")?.clone();

        Ok(Self::from_parts(
            grant,
            Arc::new(config),
            token_url,
            cache,
            transport,
        ))
    }
}
