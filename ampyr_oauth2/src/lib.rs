//! OAuth2 token acquisition for REST API clients
//!
//! A [`Flow`] obtains access tokens using one of several grant types, as
//! defined in [RFC 6749](https://datatracker.ietf.org/doc/html/rfc6749) and,
//! for public clients, [RFC 7636](https://datatracker.ietf.org/doc/html/rfc7636).
//! Tokens are kept in a shared [`CacheManager`][ampyr_cache::CacheManager],
//! so every flow instance built from the same configuration and cache uses
//! the same token until it expires, at which point it is refreshed or
//! re-acquired.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use ampyr_cache::FileCache;
//! use ampyr_oauth2::{AuthConfig, FlowBuilder, FlowKind, OAuth2Flow};
//!
//! let config = AuthConfig::new()
//!     .with_client_id("my-app")
//!     .with_client_secret("my-secret")
//!     .with_url_for_token("https://accounts.example.com/api/token".parse()?);
//!
//! let flow = FlowBuilder::new(config)
//!     .kind(FlowKind::ClientCredentials)
//!     .cache(Arc::new(FileCache::new(".cache/tokens.json")))
//!     .build()?;
//!
//! let token = flow.acquire().await?;
//! tracing::info!(token = format_args!("{:#?}", token.access_token()), "acquired");
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! * `rustls-tls` (default): Enables `reqwest`'s rustls backend for HTTPS
//!   token endpoints.
//! * `default-tls`: Enables `reqwest`'s native TLS backend instead.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod authorize;
mod braids;
mod config;
mod error;
pub mod flows;
mod token;
pub mod transport;

pub use authorize::{
    AuthorizationError, AuthorizationGrant, AuthorizationPrompt, AuthorizationRequest,
    ConsolePrompt, PkceChallenge,
};
pub use braids::*;
pub use config::AuthConfig;
pub use error::{ConfigError, FlowError};
pub use flows::{
    Acquisition, AuthorizationCodeFlow, ClientCredentialsFlow, Flow, FlowBuilder, FlowKind,
    NullFlow, OAuth2Flow, PkceFlow, TokenOrigin, TokenState, NULL_TOKEN,
};
pub use token::{TokenLifetimeConfig, TokenRecord, TokenStatus};
pub use transport::{
    dto::{TokenRequest, TokenResponse},
    FormBody, JsonBody, ReqwestTransport, TokenRequestError, TokenTransport,
};
