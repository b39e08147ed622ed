//! Token endpoint transport

use std::{marker::PhantomData, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub mod dto;

use dto::{TokenRequest, TokenResponse};

/// Performs token exchanges against an authority's token endpoint
///
/// Retries, if any, belong to the transport; flows never retry a failed
/// exchange.
#[async_trait]
pub trait TokenTransport: Send + Sync {
    /// Sends `request` to `token_url` and parses the token response
    async fn exchange(
        &self,
        token_url: &Url,
        request: &TokenRequest,
        timeout: Option<Duration>,
    ) -> Result<TokenResponse, TokenRequestError>;
}

/// An error while attempting to request a new token from the authority
#[derive(Debug, Error)]
pub enum TokenRequestError {
    /// The authority responded with a non-success status
    #[error("authority rejected token request with status {status}: {body}")]
    ErrorWithBody {
        /// The HTTP status returned
        status: u16,
        /// The body of the error
        body: String,
    },
    /// Unable to deserialize the token body
    #[error("error deserializing token body from authority")]
    TokenBodyError(#[from] serde_json::Error),
    /// Unable to read the response
    #[error("error reading response body")]
    BodyReadError(#[source] reqwest::Error),
    /// Unable to send a token request to the authority
    #[error("error sending request to authority")]
    RequestSend(#[source] reqwest::Error),
}

/// A transport that issues token requests with [`reqwest`]
#[derive(Debug)]
pub struct ReqwestTransport<T = FormBody> {
    client: reqwest::Client,
    content_type: PhantomData<fn() -> T>,
}

impl ReqwestTransport<FormBody> {
    /// Constructs a transport sending URL-encoded form bodies
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            content_type: PhantomData,
        }
    }

    /// Configures the transport to send requests to the authority as JSON
    pub fn using_json_body(self) -> ReqwestTransport<JsonBody> {
        ReqwestTransport {
            client: self.client,
            content_type: PhantomData,
        }
    }
}

impl Default for ReqwestTransport<FormBody> {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl<T: RequestType> TokenTransport for ReqwestTransport<T> {
    #[tracing::instrument(
        err,
        skip(self, token_url, request),
        fields(
            token_url = %token_url,
            grant_type = request.grant_type(),
            client_id = %request.client_id(),
        ),
    )]
    async fn exchange(
        &self,
        token_url: &Url,
        request: &TokenRequest,
        timeout: Option<Duration>,
    ) -> Result<TokenResponse, TokenRequestError> {
        tracing::trace!("requesting token from authority");

        let mut req = T::attach_payload(self.client.post(token_url.clone()), request);
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }

        let resp = req.send().await.map_err(TokenRequestError::RequestSend)?;

        tracing::debug!(
            response.status = resp.status().as_u16(),
            "received token response from issuing authority"
        );

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .map_err(TokenRequestError::BodyReadError)?;
            return Err(TokenRequestError::ErrorWithBody {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(TokenRequestError::BodyReadError)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// A manner of attaching a serializable payload to a request
pub trait RequestType: Send + Sync + 'static {
    /// Attaches the serializable payload to the request body
    fn attach_payload<S: serde::Serialize>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder;
}

/// Attaches the payload to the request body as JSON
#[derive(Debug)]
pub struct JsonBody;

/// Attaches the payload to the request body as URL-encoded form data
#[derive(Debug)]
pub struct FormBody;

impl RequestType for JsonBody {
    fn attach_payload<S: serde::Serialize>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder {
        request.json(payload)
    }
}

impl RequestType for FormBody {
    fn attach_payload<S: serde::Serialize>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder {
        request.form(payload)
    }
}
