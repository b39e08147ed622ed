//! In-process stand-ins for the authority, the user, and a failing cache

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use ampyr_cache::{CacheError, CacheKeyRef, CacheManager};
use ampyr_clock::DurationSecs;
use async_trait::async_trait;
use url::Url;

use crate::{
    transport::dto::{TokenRequest, TokenResponse},
    AccessToken, AuthorizationCode, AuthorizationError, AuthorizationGrant, AuthorizationPrompt,
    AuthorizationRequest, RefreshToken, TokenRecord, TokenRequestError, TokenTransport,
};

/// A token endpoint issuing sequentially numbered tokens
#[derive(Debug)]
pub(crate) struct MockAuthority {
    lifetime: DurationSecs,
    refresh_tokens: bool,
    reject_with: Option<u16>,
    exchanges: AtomicUsize,
    grant_types: Mutex<Vec<&'static str>>,
    last_request: Mutex<Option<serde_json::Value>>,
    last_timeout: Mutex<Option<Duration>>,
}

impl MockAuthority {
    pub(crate) fn new(lifetime: DurationSecs) -> Self {
        Self {
            lifetime,
            refresh_tokens: false,
            reject_with: None,
            exchanges: AtomicUsize::new(0),
            grant_types: Mutex::new(Vec::new()),
            last_request: Mutex::new(None),
            last_timeout: Mutex::new(None),
        }
    }

    pub(crate) fn issuing_refresh_tokens(mut self) -> Self {
        self.refresh_tokens = true;
        self
    }

    pub(crate) fn rejecting(mut self, status: u16) -> Self {
        self.reject_with = Some(status);
        self
    }

    pub(crate) fn token_url() -> Url {
        Url::parse("https://auth.example.com/api/token").unwrap()
    }

    pub(crate) fn authorize_url() -> Url {
        Url::parse("https://auth.example.com/authorize").unwrap()
    }

    pub(crate) fn redirect_url() -> Url {
        Url::parse("http://localhost:8888/callback").unwrap()
    }

    pub(crate) fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub(crate) fn grant_types(&self) -> Vec<&'static str> {
        self.grant_types.lock().unwrap().clone()
    }

    pub(crate) fn last_request(&self) -> Option<serde_json::Value> {
        self.last_request.lock().unwrap().clone()
    }

    pub(crate) fn last_timeout(&self) -> Option<Duration> {
        *self.last_timeout.lock().unwrap()
    }
}

#[async_trait]
impl TokenTransport for MockAuthority {
    async fn exchange(
        &self,
        token_url: &Url,
        request: &TokenRequest,
        timeout: Option<Duration>,
    ) -> Result<TokenResponse, TokenRequestError> {
        assert_eq!(token_url, &Self::token_url());

        let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        self.grant_types.lock().unwrap().push(request.grant_type());
        *self.last_request.lock().unwrap() = Some(serde_json::to_value(request).unwrap());
        *self.last_timeout.lock().unwrap() = timeout;

        if let Some(status) = self.reject_with {
            return Err(TokenRequestError::ErrorWithBody {
                status,
                body: r#"{"error":"invalid_client"}"#.to_owned(),
            });
        }

        let access_token = AccessToken::new(format!("access-{n}"));
        let response = TokenResponse::bearer(access_token, self.lifetime);
        Ok(if self.refresh_tokens {
            response.with_refresh_token(RefreshToken::new(format!("refresh-{n}")))
        } else {
            response
        })
    }
}

/// A user who approves every request, echoing either the real or a forged state
#[derive(Debug)]
pub(crate) struct MockPrompt {
    code: &'static str,
    forge_state: bool,
    prompts: AtomicUsize,
    last_url: Mutex<Option<Url>>,
}

impl MockPrompt {
    pub(crate) fn approving(code: &'static str) -> Self {
        Self {
            code,
            forge_state: false,
            prompts: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        }
    }

    pub(crate) fn forging(code: &'static str) -> Self {
        Self {
            forge_state: true,
            ..Self::approving(code)
        }
    }

    pub(crate) fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub(crate) fn last_url(&self) -> Option<Url> {
        self.last_url.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthorizationPrompt for MockPrompt {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationGrant, AuthorizationError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(request.url().clone());

        let state = if self.forge_state {
            "forged".to_owned()
        } else {
            request.state().to_owned()
        };

        Ok(AuthorizationGrant::new(
            AuthorizationCode::from_static(self.code),
            Some(state),
        ))
    }
}

/// A cache that finds nothing and refuses every write
#[derive(Debug)]
pub(crate) struct BrokenCache;

#[async_trait]
impl CacheManager<TokenRecord> for BrokenCache {
    async fn find(&self, _key: &CacheKeyRef) -> Option<TokenRecord> {
        None
    }

    async fn save(
        &self,
        _key: &CacheKeyRef,
        _value: TokenRecord,
    ) -> Result<TokenRecord, CacheError> {
        Err(CacheError::Poisoned)
    }
}
