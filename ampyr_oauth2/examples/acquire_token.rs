use std::{path::PathBuf, sync::Arc};

use ampyr_cache::FileCache;
use ampyr_clock::DurationSecs;
use ampyr_oauth2::{
    AuthConfig, ClientId, ClientSecret, FlowBuilder, FlowKind, OAuth2Flow, Scope, UserId,
};
use clap::Parser;
use url::Url;

#[derive(Debug, Parser)]
struct Opts {
    /// The grant type: client_credentials, authorization_code, pkce, or null
    #[arg(short, long, env, value_parser = parse_flow_kind, default_value = "client_credentials")]
    flow: FlowKind,

    /// The client ID of the application
    #[arg(short, long, env)]
    client_id: Option<ClientId>,

    /// The client secret used to identify the application to the authority
    #[arg(short = 's', long, env, hide_env_values = true)]
    client_secret: Option<ClientSecret>,

    /// The user whose data is being accessed
    #[arg(short = 'u', long, env)]
    client_userid: Option<UserId>,

    /// The scopes to request, space-delimited
    #[arg(long, env)]
    scope: Option<Scope>,

    /// The authority's authorization URL
    #[arg(long, env)]
    url_for_oauth: Option<Url>,

    /// The authority's token request URL
    #[arg(short, long, env)]
    url_for_token: Option<Url>,

    /// The redirect URL registered for the application
    #[arg(short, long, env)]
    url_for_redirect: Option<Url>,

    /// Seconds to wait on the token endpoint
    #[arg(long, env, default_value_t = 30)]
    timeout: u64,

    /// The root of the token cache file
    #[arg(long, env, default_value = ampyr_cache::DEFAULT_CACHE_PATH)]
    cache_root: PathBuf,
}

fn parse_flow_kind(s: &str) -> Result<FlowKind, serde_json::Error> {
    serde_json::from_value(serde_json::Value::String(s.to_owned()))
}

impl Opts {
    fn auth_config(&self) -> AuthConfig {
        let mut config = AuthConfig::new().with_timeout(DurationSecs(self.timeout));
        if let Some(client_id) = &self.client_id {
            config = config.with_client_id(client_id.clone());
        }
        if let Some(client_secret) = &self.client_secret {
            config = config.with_client_secret(client_secret.clone());
        }
        if let Some(client_userid) = &self.client_userid {
            config = config.with_client_userid(client_userid.clone());
        }
        if let Some(scope) = &self.scope {
            config = config.with_scope(scope.clone());
        }
        if let Some(url) = &self.url_for_oauth {
            config = config.with_url_for_oauth(url.clone());
        }
        if let Some(url) = &self.url_for_token {
            config = config.with_url_for_token(url.clone());
        }
        if let Some(url) = &self.url_for_redirect {
            config = config.with_url_for_redirect(url.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let cache = FileCache::with_ids(
        Some(&opts.cache_root),
        [
            opts.client_id.as_ref().map(|id| id.as_str()),
            opts.client_userid.as_ref().map(|id| id.as_str()),
        ],
    );
    tracing::debug!(path = %cache.path().display(), "using token cache");

    let flow = FlowBuilder::new(opts.auth_config())
        .kind(opts.flow)
        .cache(Arc::new(cache))
        .build()?;

    let first = flow.acquire().await?;
    tracing::info!(
        token = format_args!("{:#?}", first.access_token()),
        origin = ?first.origin(),
        "first access token"
    );
    if let Some(error) = first.persist_error() {
        tracing::warn!(error = (error as &dyn std::error::Error), "token was not cached");
    }

    let second = flow.acquire().await?;
    tracing::info!(
        token = format_args!("{:#?}", second.access_token()),
        origin = ?second.origin(),
        "second access token"
    );

    Ok(())
}
