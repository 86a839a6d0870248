//! Service configuration
//!
//! Object-store and CDN settings come from the environment; the listen
//! address and the cache switch come from the CLI. Missing bucket or CDN
//! configuration is a startup error, surfaced before anything binds.

use std::env;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Whether the two cache tiers are consulted unless `--cache` says otherwise.
pub const DEFAULT_CACHE_ENABLED: bool = true;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3333;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub web: WebConfig,
    pub store: StoreConfig,
    pub cache_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// CDN host fronting the bucket; resolved icons are returned as
    /// `https://<cdn_host>/favicons/<host>.png`.
    pub cdn_host: String,
}

impl Config {
    /// Assemble configuration from the environment plus CLI overrides.
    pub fn from_env(host: String, port: u16, cache_enabled: bool) -> Result<Self> {
        let bucket = env::var("AWS_BUCKET").unwrap_or_default();
        if bucket.is_empty() {
            bail!("no bucket defined (AWS_BUCKET is empty)");
        }

        let cdn_host = env::var("ASSET_URL_FOR_BUCKET").unwrap_or_default();
        if cdn_host.is_empty() {
            bail!("no CDN host defined (ASSET_URL_FOR_BUCKET is empty)");
        }

        Ok(Self {
            web: WebConfig { host, port },
            store: StoreConfig {
                access_key_id: env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
                secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
                endpoint: env::var("AWS_ENDPOINT").ok().filter(|s| !s.is_empty()),
                region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                bucket,
                cdn_host,
            },
            cache_enabled,
        })
    }
}
