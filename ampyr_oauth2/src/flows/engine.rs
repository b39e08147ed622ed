//! The token state machine shared by every network-backed flow

use std::{fmt, sync::Arc};

use ampyr_cache::{CacheError, CacheKey, CacheKeyRef, CacheManager};
use ampyr_clock::{Clock, System};
use async_trait::async_trait;
use tokio::sync::Mutex;
use url::Url;

use super::{Acquisition, FlowKind, OAuth2Flow, TokenOrigin, TokenState};
use crate::{
    transport::dto::TokenRequest, AuthConfig, FlowError, RefreshTokenRef, TokenLifetimeConfig,
    TokenRecord, TokenStatus, TokenTransport,
};

/// The exchange mechanics of one OAuth2 grant type
#[async_trait]
pub trait Grant: fmt::Debug + Send + Sync {
    /// The flow this grant implements
    const KIND: FlowKind;

    /// Builds the request for a full token exchange, performing any user
    /// interaction it requires first
    async fn full_exchange(&self) -> Result<TokenRequest, FlowError>;

    /// Builds a refresh request, or `None` if this grant never refreshes
    fn refresh_exchange(&self, refresh_token: &RefreshTokenRef) -> Option<TokenRequest>;
}

/// A flow that acquires tokens through a [`Grant`] and keeps them in a
/// shared cache
///
/// The flow holds no token state of its own. Every [`acquire`][Self::acquire]
/// re-derives the state from the cache, so separate instances with the same
/// configuration and cache observe the same token.
pub struct FlowEngine<G, C = System> {
    grant: G,
    config: Arc<AuthConfig>,
    token_url: Url,
    cache: Arc<dyn CacheManager<TokenRecord>>,
    transport: Arc<dyn TokenTransport>,
    lifetime: TokenLifetimeConfig<C>,
    cache_key: CacheKey,
    exchange_lock: Mutex<()>,
}

impl<G: Grant> FlowEngine<G, System> {
    pub(crate) fn from_parts(
        grant: G,
        config: Arc<AuthConfig>,
        token_url: Url,
        cache: Arc<dyn CacheManager<TokenRecord>>,
        transport: Arc<dyn TokenTransport>,
    ) -> Self {
        let cache_key = config.cache_key(G::KIND);
        Self {
            grant,
            config,
            token_url,
            cache,
            transport,
            lifetime: TokenLifetimeConfig::default(),
            cache_key,
            exchange_lock: Mutex::new(()),
        }
    }
}

impl<G, C> FlowEngine<G, C> {
    /// Replaces the lifetime configuration, including its clock
    pub fn with_lifetime_config<D>(self, lifetime: TokenLifetimeConfig<D>) -> FlowEngine<G, D> {
        FlowEngine {
            grant: self.grant,
            config: self.config,
            token_url: self.token_url,
            cache: self.cache,
            transport: self.transport,
            lifetime,
            cache_key: self.cache_key,
            exchange_lock: self.exchange_lock,
        }
    }

    /// The key this flow's token is cached under
    pub fn cache_key(&self) -> &CacheKeyRef {
        &self.cache_key
    }

    /// The grant driving this flow
    pub fn grant(&self) -> &G {
        &self.grant
    }
}

impl<G, C> FlowEngine<G, C>
where
    G: Grant,
    C: Clock + Send + Sync,
{
    /// Derives the token state from the cache's current contents
    pub async fn state(&self) -> TokenState {
        match self.cache.find(&self.cache_key).await {
            None => TokenState::NoToken,
            Some(record) => match self.lifetime.status(&record) {
                TokenStatus::Valid => TokenState::Valid(record),
                TokenStatus::Expired => TokenState::Expired(record),
            },
        }
    }

    /// Returns a valid access token, exchanging or refreshing as needed
    ///
    /// Exchange failures are returned. A failure to cache a freshly
    /// obtained token is not: the token is still returned, with the cache
    /// error reported in [`Acquisition::persist_error`].
    pub async fn acquire(&self) -> Result<Acquisition, FlowError> {
        if let TokenState::Valid(record) = self.state().await {
            return Ok(self.cached(record));
        }

        let _guard = self.exchange_lock.lock().await;

        let (record, origin) = match self.state().await {
            TokenState::Valid(record) => return Ok(self.cached(record)),
            TokenState::Expired(stale) => {
                let refresh = stale
                    .refresh_token()
                    .and_then(|rt| self.grant.refresh_exchange(rt).map(|req| (rt, req)));

                match refresh {
                    Some((refresh_token, request)) => {
                        tracing::debug!(
                            cache_key = %self.cache_key,
                            expiry = stale.expiry().0,
                            "cached token expired, refreshing"
                        );
                        let record = self.exchange(request, Some(refresh_token)).await?;
                        (record, TokenOrigin::Refresh)
                    }
                    None => {
                        tracing::debug!(
                            cache_key = %self.cache_key,
                            expiry = stale.expiry().0,
                            "cached token expired without refresh, reauthorizing"
                        );
                        (self.full_exchange().await?, TokenOrigin::Exchange)
                    }
                }
            }
            TokenState::NoToken => {
                tracing::debug!(cache_key = %self.cache_key, "no cached token, authorizing");
                (self.full_exchange().await?, TokenOrigin::Exchange)
            }
        };

        let persist_error = self.persist(&record).await;

        Ok(Acquisition::new(
            record.into_access_token(),
            origin,
            persist_error,
        ))
    }

    fn cached(&self, record: TokenRecord) -> Acquisition {
        tracing::trace!(
            cache_key = %self.cache_key,
            expiry = record.expiry().0,
            "using cached token"
        );
        Acquisition::new(record.into_access_token(), TokenOrigin::Cache, None)
    }

    async fn full_exchange(&self) -> Result<TokenRecord, FlowError> {
        let request = self.grant.full_exchange().await?;
        self.exchange(request, None).await
    }

    async fn exchange(
        &self,
        request: TokenRequest,
        previous_refresh: Option<&RefreshTokenRef>,
    ) -> Result<TokenRecord, FlowError> {
        let timeout = self.config.timeout().map(Into::into);
        let resp = self
            .transport
            .exchange(&self.token_url, &request, timeout)
            .await?;

        let refresh_token = resp
            .refresh_token
            .or_else(|| previous_refresh.map(ToOwned::to_owned));

        let record = self
            .lifetime
            .create_record(resp.access_token, refresh_token, resp.expires_in)
            .with_scope(resp.scope);

        tracing::info!(
            flow = %G::KIND,
            grant_type = request.grant_type(),
            has_refresh_token = record.refresh_token().is_some(),
            lifetime = record.lifetime().0,
            expiry = record.expiry().0,
            "received new token"
        );

        Ok(record)
    }

    async fn persist(&self, record: &TokenRecord) -> Option<CacheError> {
        match self.cache.save(&self.cache_key, record.clone()).await {
            Ok(_) => {
                tracing::trace!(cache_key = %self.cache_key, "cached new token");
                None
            }
            Err(error) => {
                tracing::warn!(
                    cache_key = %self.cache_key,
                    error = (&error as &dyn std::error::Error),
                    "unable to cache new token"
                );
                Some(error)
            }
        }
    }
}

#[async_trait]
impl<G, C> OAuth2Flow for FlowEngine<G, C>
where
    G: Grant,
    C: Clock + Send + Sync,
{
    fn kind(&self) -> FlowKind {
        G::KIND
    }

    fn auth_config(&self) -> &AuthConfig {
        &self.config
    }

    async fn acquire(&self) -> Result<Acquisition, FlowError> {
        FlowEngine::acquire(self).await
    }
}

impl<G, C> fmt::Debug for FlowEngine<G, C>
where
    G: fmt::Debug,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FlowEngine")
            .field("grant", &self.grant)
            .field("token_url", &self.token_url.as_str())
            .field("lifetime", &self.lifetime)
            .field("cache_key", &self.cache_key)
            .finish()
    }
}
