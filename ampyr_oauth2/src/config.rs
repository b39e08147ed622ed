use ampyr_cache::{CacheKey, KeyBuilder};
use ampyr_clock::DurationSecs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::{
    ClientId, ClientIdRef, ClientSecret, ClientSecretRef, ConfigError, FlowKind, Scope, ScopeRef,
    UserId, UserIdRef,
};

/// Credentials and endpoints driving an OAuth2 flow
///
/// Every field is optional here; each flow checks for what it needs when
/// it is constructed. Once handed to a flow the configuration is shared
/// immutably.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    client_id: Option<ClientId>,
    client_secret: Option<ClientSecret>,
    client_userid: Option<UserId>,
    scope: Option<Scope>,
    url_for_oauth: Option<Url>,
    url_for_token: Option<Url>,
    url_for_redirect: Option<Url>,
    timeout: Option<DurationSecs>,
}

impl AuthConfig {
    /// Constructs an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client identifier of the application
    pub fn with_client_id(mut self, client_id: impl Into<ClientId>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the client secret of the application
    pub fn with_client_secret(mut self, client_secret: impl Into<ClientSecret>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Sets the user whose data is being accessed
    pub fn with_client_userid(mut self, client_userid: impl Into<UserId>) -> Self {
        self.client_userid = Some(client_userid.into());
        self
    }

    /// Sets the requested scope
    pub fn with_scope(mut self, scope: impl Into<Scope>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets the authorization endpoint users are sent to
    pub fn with_url_for_oauth(mut self, url: Url) -> Self {
        self.url_for_oauth = Some(url);
        self
    }

    /// Sets the token endpoint
    pub fn with_url_for_token(mut self, url: Url) -> Self {
        self.url_for_token = Some(url);
        self
    }

    /// Sets the redirect URL registered for the application
    pub fn with_url_for_redirect(mut self, url: Url) -> Self {
        self.url_for_redirect = Some(url);
        self
    }

    /// Sets the timeout forwarded to the token transport
    pub fn with_timeout(mut self, timeout: DurationSecs) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The client identifier
    pub fn client_id(&self) -> Option<&ClientIdRef> {
        self.client_id.as_deref()
    }

    /// The client secret
    pub fn client_secret(&self) -> Option<&ClientSecretRef> {
        self.client_secret.as_deref()
    }

    /// The user whose data is being accessed
    pub fn client_userid(&self) -> Option<&UserIdRef> {
        self.client_userid.as_deref()
    }

    /// The requested scope
    pub fn scope(&self) -> Option<&ScopeRef> {
        self.scope.as_deref()
    }

    /// The authorization endpoint
    pub fn url_for_oauth(&self) -> Option<&Url> {
        self.url_for_oauth.as_ref()
    }

    /// The token endpoint
    pub fn url_for_token(&self) -> Option<&Url> {
        self.url_for_token.as_ref()
    }

    /// The redirect URL
    pub fn url_for_redirect(&self) -> Option<&Url> {
        self.url_for_redirect.as_ref()
    }

    /// The transport timeout
    pub fn timeout(&self) -> Option<DurationSecs> {
        self.timeout
    }

    /// Derives the key under which a flow of `kind` caches its token
    ///
    /// The key covers the client, user, scope, and token endpoint. The
    /// client secret contributes only a SHA-256 fingerprint.
    pub fn cache_key(&self, kind: FlowKind) -> CacheKey {
        let fingerprint = self
            .client_secret
            .as_ref()
            .map(|s| format!("{:x}", Sha256::digest(s.as_str().as_bytes())));

        KeyBuilder::new(kind.type_tag())
            .method("acquire")
            .arg("client_id", &self.client_id().map(ClientIdRef::as_str))
            .arg("client_secret", &fingerprint)
            .arg("client_userid", &self.client_userid().map(UserIdRef::as_str))
            .arg("scope", &self.scope().map(ScopeRef::as_str))
            .arg("url_for_token", &self.url_for_token().map(Url::as_str))
            .build()
    }
}

pub(crate) fn require<'a, T: ?Sized>(
    value: Option<&'a T>,
    flow: FlowKind,
    field: &'static str,
) -> Result<&'a T, ConfigError> {
    value.ok_or(ConfigError::Missing { flow, field })
}
