//! The out-of-band user authorization step of redirect-based flows

use std::io;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

use crate::{AuthorizationCode, ClientIdRef, CodeVerifier, CodeVerifierRef, ScopeRef};

fn random_token(len: usize) -> String {
    let mut bytes = vec![0_u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A PKCE verifier and its S256 challenge
#[derive(Debug)]
pub struct PkceChallenge {
    verifier: CodeVerifier,
    challenge: String,
}

impl PkceChallenge {
    /// The only challenge method produced
    pub const METHOD: &'static str = "S256";

    /// Generates a fresh verifier from 32 random bytes
    pub fn generate() -> Self {
        Self::from_verifier(CodeVerifier::new(random_token(32)))
    }

    /// Derives the challenge for an existing verifier
    pub fn from_verifier(verifier: CodeVerifier) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_str().as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }

    /// The verifier presented at the token exchange
    pub fn verifier(&self) -> &CodeVerifierRef {
        &self.verifier
    }

    /// The challenge sent with the authorization request
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub(crate) fn into_verifier(self) -> CodeVerifier {
        self.verifier
    }
}

/// An authorization request awaiting the user's approval
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
    url: Url,
    state: String,
    redirect_uri: Url,
}

impl AuthorizationRequest {
    pub(crate) fn new(
        authorize_url: &Url,
        client_id: &ClientIdRef,
        redirect_uri: &Url,
        scope: Option<&ScopeRef>,
        pkce: Option<&PkceChallenge>,
    ) -> Self {
        let state = random_token(16);

        let mut url = authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", client_id.as_str())
                .append_pair("redirect_uri", redirect_uri.as_str())
                .append_pair("state", &state);
            if let Some(scope) = scope {
                query.append_pair("scope", scope.as_str());
            }
            if let Some(pkce) = pkce {
                query
                    .append_pair("code_challenge", pkce.challenge())
                    .append_pair("code_challenge_method", PkceChallenge::METHOD);
            }
        }

        Self {
            url,
            state,
            redirect_uri: redirect_uri.clone(),
        }
    }

    /// The URL the user must visit to grant access
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The anti-forgery state the redirect must echo back
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Where the authority will send the user after they respond
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }
}

/// The result of the user granting access
#[derive(Debug)]
pub struct AuthorizationGrant {
    code: AuthorizationCode,
    state: Option<String>,
}

impl AuthorizationGrant {
    /// A grant carrying `code` and the echoed `state`
    pub fn new(code: AuthorizationCode, state: Option<String>) -> Self {
        Self { code, state }
    }

    /// Parses the query of the URL the authority redirected the user to
    pub fn from_redirect(redirect: &Url) -> Result<Self, AuthorizationError> {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;

        for (name, value) in redirect.query_pairs() {
            match name.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(AuthorizationError::Denied { error, description });
        }

        let code = code.ok_or(AuthorizationError::MissingCode)?;
        Ok(Self::new(AuthorizationCode::new(code), state))
    }

    /// Checks the echoed state and yields the code
    pub(crate) fn verify(
        self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationCode, AuthorizationError> {
        match self.state.as_deref() {
            Some(state) if state == request.state() => Ok(self.code),
            _ => Err(AuthorizationError::StateMismatch),
        }
    }
}

/// An error in the user authorization step
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// The user or the authority refused the request
    #[error("authorization denied: {error}")]
    Denied {
        /// The OAuth2 error code
        error: String,
        /// A human-readable explanation, if provided
        description: Option<String>,
    },
    /// The redirect carried no authorization code
    #[error("redirect did not include an authorization code")]
    MissingCode,
    /// The redirect's state did not match the request
    #[error("redirect state does not match the authorization request")]
    StateMismatch,
    /// The redirect URL could not be parsed
    #[error("invalid redirect URL")]
    InvalidRedirect(#[from] url::ParseError),
    /// Reading the user's response failed
    #[error("unable to read authorization response")]
    Input(#[from] io::Error),
}

/// Obtains the user's approval of an authorization request
#[async_trait]
pub trait AuthorizationPrompt: Send + Sync {
    /// Presents `request` to the user and returns the resulting grant
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationGrant, AuthorizationError>;
}

/// Prompts on the terminal: prints the authorization URL and reads back
/// the URL the browser was redirected to
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsolePrompt;

#[async_trait]
impl AuthorizationPrompt for ConsolePrompt {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationGrant, AuthorizationError> {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

        let mut stderr = tokio::io::stderr();
        let message = format!(
            "Open the following URL to authorize this application:\n\n    {}\n\nThen paste the URL you were redirected to: ",
            request.url()
        );
        stderr.write_all(message.as_bytes()).await?;
        stderr.flush().await?;

        let mut line = String::new();
        tokio::io::BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;

        let redirect = Url::parse(line.trim())?;
        AuthorizationGrant::from_redirect(&redirect)
    }
}
