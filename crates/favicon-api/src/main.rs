use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use favicon_api::{
    cache::{DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, MemoryCache},
    config::{Config, DEFAULT_CACHE_ENABLED, DEFAULT_HOST, DEFAULT_PORT},
    fetch::IconFetcher,
    services::{RateLimiter, ResolverService},
    store::S3ObjectStore,
    web::WebServer,
};

/// Resolutions admitted per second across all in-flight requests.
const RATE_LIMIT_PER_SECOND: u32 = 100;

#[derive(Parser)]
#[command(name = "favicon-api")]
#[command(version)]
#[command(about = "Favicon resolution and normalization service")]
struct Cli {
    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP", default_value = DEFAULT_HOST)]
    host: String,

    /// Listening port
    #[arg(short, long, value_name = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Enable or disable the cache tiers
    #[arg(long, value_name = "BOOL", default_value_t = DEFAULT_CACHE_ENABLED, action = clap::ArgAction::Set)]
    cache: bool,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("favicon_api={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting favicon API v{} (cache: {})",
        env!("CARGO_PKG_VERSION"),
        if cli.cache { "enabled" } else { "disabled" }
    );

    let config = Config::from_env(cli.host, cli.port, cli.cache)?;
    info!(bucket = %config.store.bucket, cdn = %config.store.cdn_host, "object store configured");

    let store = Arc::new(S3ObjectStore::new(&config.store));
    let cache = MemoryCache::new(DEFAULT_TTL);
    cache.spawn_eviction_task(DEFAULT_SWEEP_INTERVAL);

    let resolver = Arc::new(ResolverService::new(
        IconFetcher::new()?,
        store,
        cache,
        RateLimiter::new(RATE_LIMIT_PER_SECOND),
        config.cache_enabled,
        config.store.cdn_host.clone(),
    ));

    WebServer::new(&config, resolver)?.serve().await
}
