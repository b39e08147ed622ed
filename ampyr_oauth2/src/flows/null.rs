use std::sync::Arc;

use async_trait::async_trait;

use super::{Acquisition, FlowKind, OAuth2Flow, TokenOrigin};
use crate::{AccessToken, AuthConfig, FlowError};

/// The token returned by [`NullFlow`]
pub const NULL_TOKEN: &str = "null-token";

/// A flow for APIs that need no authorization
///
/// Never contacts the network or the cache and always yields the same
/// non-expiring sentinel token.
#[derive(Clone, Debug)]
pub struct NullFlow {
    config: Arc<AuthConfig>,
}

impl NullFlow {
    /// Constructs a null flow
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl OAuth2Flow for NullFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::Null
    }

    fn auth_config(&self) -> &AuthConfig {
        &self.config
    }

    async fn acquire(&self) -> Result<Acquisition, FlowError> {
        Ok(Acquisition::new(
            AccessToken::from_static(NULL_TOKEN),
            TokenOrigin::Sentinel,
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_returns_the_sentinel() {
        let flow = NullFlow::new(AuthConfig::new().with_client_id("app"));

        for _ in 0..3 {
            let acquired = flow.acquire().await.unwrap();
            assert_eq!(acquired.access_token().as_str(), NULL_TOKEN);
            assert_eq!(acquired.origin(), TokenOrigin::Sentinel);
            assert!(acquired.persist_error().is_none());
        }
    }
}
