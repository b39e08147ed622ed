use thiserror::Error;

use crate::{AuthorizationError, FlowKind, TokenRequestError};

/// A flow was constructed without the configuration it requires
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent
    #[error("{flow} flow requires `{field}` to be configured")]
    Missing {
        /// The flow being constructed
        flow: FlowKind,
        /// The missing setting
        field: &'static str,
    },
}

/// An error acquiring an access token
#[derive(Debug, Error)]
pub enum FlowError {
    /// The token endpoint rejected the exchange or could not be reached
    #[error("token exchange failed")]
    Exchange(#[from] TokenRequestError),
    /// The user authorization step did not produce an authorization code
    #[error("user authorization failed")]
    Authorization(#[from] AuthorizationError),
    /// The flow was not configured with the settings it requires
    #[error(transparent)]
    Config(#[from] ConfigError),
}
