//! Resolution coordinator
//!
//! The top-level state machine tying the pipeline together:
//! validate → cache probe → rate gate → discover → normalize → store →
//! respond. All process-wide collaborators (HTTP clients, object store,
//! memory cache, rate limiter) are handed in as one bundle at startup.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::SERVICE_VERSION;
use crate::cache::{MemoryCache, cache_key};
use crate::discovery::{self, ResolvedIcon};
use crate::errors::{AppError, AppResult, DiscoveryError};
use crate::fetch::IconFetcher;
use crate::normalize;
use crate::services::RateLimiter;
use crate::store::{ObjectStore, object_key};
use crate::utils::url;

/// Maximum accepted length of a target URL, in bytes.
pub const MAX_URL_BYTES: usize = 1 << 16;

/// A completed resolution: the externally visible value (CDN URL or fallback)
/// plus the metadata map that was committed to the object store.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub value: String,
    pub meta: HashMap<String, String>,
}

pub struct ResolverService {
    fetcher: IconFetcher,
    store: Arc<dyn ObjectStore>,
    cache: MemoryCache,
    rate_limiter: RateLimiter,
    cache_enabled: bool,
    cdn_host: String,
}

impl ResolverService {
    pub fn new(
        fetcher: IconFetcher,
        store: Arc<dyn ObjectStore>,
        cache: MemoryCache,
        rate_limiter: RateLimiter,
        cache_enabled: bool,
        cdn_host: String,
    ) -> Self {
        Self {
            fetcher,
            store,
            cache,
            rate_limiter,
            cache_enabled,
            cdn_host,
        }
    }

    /// Resolve the favicon for `raw_url`, returning the CDN URL of the
    /// normalized icon, or `fallback_url` when discovery finds nothing
    /// usable.
    pub async fn resolve(&self, raw_url: &str, fallback_url: &str) -> AppResult<Resolution> {
        if raw_url.len() > MAX_URL_BYTES {
            return Err(AppError::validation(
                "url field must not be greater than 65,536 bytes",
            ));
        }

        let target = normalize_target(raw_url)?;
        let host = url::host(&target)?;
        if host.is_empty() {
            return Err(AppError::validation("url field must be a valid url"));
        }

        let key = object_key(&host);
        if self.cache_enabled {
            if let Some(meta) = self.probe_caches(&host, &key).await? {
                return Ok(Resolution {
                    value: self.cdn_url(&key),
                    meta,
                });
            }
        }

        self.rate_limiter.acquire().await;

        let icon = match discovery::find_icon(&self.fetcher, &target).await {
            Ok(icon) => icon,
            Err(AppError::Discovery(DiscoveryError::IconNotFound)) => {
                return Ok(Resolution {
                    value: fallback_url.to_string(),
                    meta: HashMap::from([("isFallback".to_string(), "true".to_string())]),
                });
            }
            Err(err) => return Err(err),
        };

        let meta = self.normalize_and_store(icon, &key).await?;
        if self.cache_enabled {
            self.cache.insert(cache_key(&host), meta.clone());
        }

        Ok(Resolution {
            value: self.cdn_url(&key),
            meta,
        })
    }

    /// Memory tier first, then an object-store `HEAD` keyed by the current
    /// service version. A stale stored version is a miss and will be
    /// overwritten by the recompute.
    async fn probe_caches(
        &self,
        host: &str,
        key: &str,
    ) -> AppResult<Option<HashMap<String, String>>> {
        let memory_key = cache_key(host);
        if let Some(meta) = self.cache.get(&memory_key) {
            debug!(host, "memory cache hit");
            return Ok(Some(meta));
        }

        if let Some(meta) = self.store.head(key).await? {
            if meta.get("version").map(String::as_str) == Some(SERVICE_VERSION) {
                debug!(host, "object store hit");
                self.cache.insert(memory_key, meta.clone());
                return Ok(Some(meta));
            }
            debug!(host, "stored object has stale version, recomputing");
        }

        Ok(None)
    }

    /// Drain the icon body, normalize it, and commit the PNG to the object
    /// store. The `PUT` completes before the caller populates the memory
    /// tier, so a peer observing a memory hit is guaranteed the object
    /// exists.
    async fn normalize_and_store(
        &self,
        icon: ResolvedIcon,
        key: &str,
    ) -> AppResult<HashMap<String, String>> {
        let icon_url = icon.url;
        let kind = icon.kind;
        let bytes = icon
            .body
            .read_to_end()
            .await
            .map_err(|err| AppError::internal(format!("reading icon body: {err}")))?;

        info!(url = %icon_url, ?kind, size = bytes.len(), "normalizing icon");

        let normalized = normalize::normalize(kind, &bytes)?;
        let png = normalized.encode_png()?;

        let meta = HashMap::from([
            ("version".to_string(), SERVICE_VERSION.to_string()),
            (
                "filled".to_string(),
                if normalized.filled { "yes" } else { "no" }.to_string(),
            ),
        ]);

        self.store
            .put(key, png, "image/png", meta.clone())
            .await?;

        Ok(meta)
    }

    fn cdn_url(&self, key: &str) -> String {
        format!("https://{}/{}", self.cdn_host, key)
    }
}

/// Validate and normalize the target URL: it must carry a parseable
/// authority, either as given or after prepending `https://`.
fn normalize_target(raw_url: &str) -> AppResult<String> {
    if url::authority_end(raw_url).is_ok() {
        return Ok(raw_url.to_string());
    }

    let prefixed = format!("https://{raw_url}");
    url::authority_end(&prefixed)?;
    Ok(prefixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_TTL;
    use crate::store::MemoryObjectStore;
    use crate::store::memory::StoredObject;
    use std::time::Duration;

    fn service(store: Arc<MemoryObjectStore>, cache_enabled: bool) -> ResolverService {
        ResolverService::new(
            IconFetcher::new().unwrap(),
            store,
            MemoryCache::new(DEFAULT_TTL),
            RateLimiter::new(100),
            cache_enabled,
            "cdn.example.net".to_string(),
        )
    }

    fn versioned_meta() -> HashMap<String, String> {
        HashMap::from([
            ("version".to_string(), SERVICE_VERSION.to_string()),
            ("filled".to_string(), "yes".to_string()),
        ])
    }

    #[tokio::test]
    async fn rejects_oversized_urls() {
        let resolver = service(Arc::new(MemoryObjectStore::new()), true);
        let url = format!("https://example.com/{}", "a".repeat(MAX_URL_BYTES));
        let err = resolver.resolve(&url, "").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(err.to_string().contains("65,536"));
    }

    #[tokio::test]
    async fn rejects_urls_without_a_host() {
        let resolver = service(Arc::new(MemoryObjectStore::new()), true);
        let err = resolver.resolve("", "").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn bare_hosts_gain_an_https_scheme() {
        assert_eq!(
            normalize_target("example.com/page").unwrap(),
            "https://example.com/page"
        );
        assert_eq!(
            normalize_target("https://example.com").unwrap(),
            "https://example.com"
        );
    }

    #[tokio::test]
    async fn object_store_hit_skips_discovery_and_warms_memory() {
        let store = Arc::new(MemoryObjectStore::new());
        store.seed(
            "favicons/example.com.png",
            StoredObject {
                bytes: vec![1, 2, 3],
                content_type: "image/png".to_string(),
                metadata: versioned_meta(),
            },
        );
        let resolver = service(store, true);

        let resolution = resolver.resolve("https://example.com", "").await.unwrap();
        assert_eq!(
            resolution.value,
            "https://cdn.example.net/favicons/example.com.png"
        );
        assert_eq!(resolution.meta, versioned_meta());
        // second lookup is served by the memory tier
        assert!(resolver.cache.get(&cache_key("example.com")).is_some());
    }

    #[tokio::test]
    async fn memory_hit_is_keyed_by_host() {
        let resolver = service(Arc::new(MemoryObjectStore::new()), true);
        resolver.cache.insert(cache_key("example.com"), versioned_meta());

        let resolution = resolver
            .resolve("https://EXAMPLE.com:443/deep/page?q=1", "")
            .await
            .unwrap();
        assert_eq!(
            resolution.value,
            "https://cdn.example.net/favicons/example.com.png"
        );
    }

    #[tokio::test]
    async fn stale_version_is_a_miss() {
        let store = Arc::new(MemoryObjectStore::new());
        store.seed(
            "favicons/127.0.0.1.png",
            StoredObject {
                bytes: vec![0],
                content_type: "image/png".to_string(),
                metadata: HashMap::from([("version".to_string(), "0.0.0-old".to_string())]),
            },
        );
        let resolver = service(store, true);

        // the stale entry forces a recompute, which fails fast against a
        // closed local port and classifies as unreachable
        let err = tokio::time::timeout(
            Duration::from_secs(30),
            resolver.resolve("http://127.0.0.1:9/x", ""),
        )
        .await
        .expect("resolution did not finish")
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::Discovery(DiscoveryError::UnreachableServer)
        ));
    }

    #[tokio::test]
    async fn disabled_cache_bypasses_seeded_store() {
        let store = Arc::new(MemoryObjectStore::new());
        store.seed(
            "favicons/127.0.0.1.png",
            StoredObject {
                bytes: vec![0],
                content_type: "image/png".to_string(),
                metadata: versioned_meta(),
            },
        );
        let resolver = service(store, false);

        // with caching off even a fresh stored object is ignored
        let err = tokio::time::timeout(
            Duration::from_secs(30),
            resolver.resolve("http://127.0.0.1:9/x", ""),
        )
        .await
        .expect("resolution did not finish")
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::Discovery(DiscoveryError::UnreachableServer)
        ));
    }
}
