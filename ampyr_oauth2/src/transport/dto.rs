//! DTOs exchanged with OAuth2 token endpoints

use ampyr_clock::DurationSecs;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    AccessToken, AuthorizationCode, ClientId, ClientIdRef, ClientSecret, CodeVerifier,
    RefreshToken, Scope,
};

/// A request sent to the token endpoint
#[derive(Debug, Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
pub enum TokenRequest {
    /// Exchanges the application's own credentials for a token
    ClientCredentials {
        /// The client ID
        client_id: ClientId,
        /// The client secret
        client_secret: ClientSecret,
        /// The requested scope
        #[serde(skip_serializing_if = "Option::is_none")]
        scope: Option<Scope>,
    },
    /// Exchanges an authorization code for a token
    AuthorizationCode {
        /// The code returned to the redirect URL
        code: AuthorizationCode,
        /// The redirect URL used in the authorization request
        redirect_uri: Url,
        /// The client ID
        client_id: ClientId,
        /// The client secret, for confidential clients
        #[serde(skip_serializing_if = "Option::is_none")]
        client_secret: Option<ClientSecret>,
        /// The PKCE code verifier
        #[serde(skip_serializing_if = "Option::is_none")]
        code_verifier: Option<CodeVerifier>,
    },
    /// Exchanges a refresh token for a new token
    RefreshToken {
        /// The refresh token
        refresh_token: RefreshToken,
        /// The client ID
        client_id: ClientId,
        /// The client secret, for confidential clients
        #[serde(skip_serializing_if = "Option::is_none")]
        client_secret: Option<ClientSecret>,
        /// The requested scope
        #[serde(skip_serializing_if = "Option::is_none")]
        scope: Option<Scope>,
    },
}

impl TokenRequest {
    /// The OAuth2 grant type of the request
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::ClientCredentials { .. } => "client_credentials",
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken { .. } => "refresh_token",
        }
    }

    /// The client making the request
    pub fn client_id(&self) -> &ClientIdRef {
        match self {
            Self::ClientCredentials { client_id, .. }
            | Self::AuthorizationCode { client_id, .. }
            | Self::RefreshToken { client_id, .. } => client_id,
        }
    }
}

/// A successful response from the token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// The issued access token
    pub access_token: AccessToken,
    /// The token type, usually `Bearer`
    #[serde(default)]
    pub token_type: Option<String>,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: Option<DurationSecs>,
    /// A refresh token, if one was issued
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
    /// The granted scope, if it differs from the requested one
    #[serde(default)]
    pub scope: Option<Scope>,
}

impl TokenResponse {
    /// A bearer token response expiring after `expires_in`
    pub fn bearer(access_token: AccessToken, expires_in: DurationSecs) -> Self {
        Self {
            access_token,
            token_type: Some("Bearer".to_owned()),
            expires_in: Some(expires_in),
            refresh_token: None,
            scope: None,
        }
    }

    /// Attaches a refresh token
    pub fn with_refresh_token(mut self, refresh_token: RefreshToken) -> Self {
        self.refresh_token = Some(refresh_token);
        self
    }
}
