//! In-process memory cache tier
//!
//! Maps `host ++ SERVICE_VERSION` to the metadata committed to the object
//! store. Entries expire lazily on read and a background sweeper evicts the
//! rest, logging hit/miss counters each pass. The object-store tier stays
//! authoritative; this tier only short-circuits the `HEAD` probe.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::SERVICE_VERSION;

/// Default time-to-live for memory-tier entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// How often the background sweeper runs.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Cache key for a host under the current service version.
pub fn cache_key(host: &str) -> String {
    format!("{host}{SERVICE_VERSION}")
}

#[derive(Debug, Clone)]
struct Entry {
    meta: HashMap<String, String>,
    stored_at: Instant,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Process-wide TTL cache over resolved favicon metadata.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, Entry>>,
    counters: Arc<Counters>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
            ttl,
        }
    }

    /// Look up a key, expiring it lazily if its TTL has passed.
    pub fn get(&self, key: &str) -> Option<HashMap<String, String>> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.stored_at.elapsed() < self.ttl {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.meta.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: String, meta: HashMap<String, String>) {
        self.entries.insert(
            key,
            Entry {
                meta,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn the background eviction task. The task sweeps expired entries
    /// and logs cache statistics on every pass, for the life of the process.
    pub fn spawn_eviction_task(&self, every: Duration) {
        let entries = Arc::clone(&self.entries);
        let counters = Arc::clone(&self.counters);
        let ttl = self.ttl;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let before = entries.len();
                entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
                debug!(
                    evicted = before - entries.len(),
                    entries = entries.len(),
                    hits = counters.hits.load(Ordering::Relaxed),
                    misses = counters.misses.load(Ordering::Relaxed),
                    "memory cache sweep"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> HashMap<String, String> {
        HashMap::from([
            ("version".to_string(), SERVICE_VERSION.to_string()),
            ("filled".to_string(), "yes".to_string()),
        ])
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let cache = MemoryCache::new(DEFAULT_TTL);
        cache.insert(cache_key("example.com"), meta());
        assert_eq!(cache.get(&cache_key("example.com")), Some(meta()));
        assert_eq!(cache.get(&cache_key("other.com")), None);
    }

    #[test]
    fn keys_embed_the_service_version() {
        assert_eq!(cache_key("example.com"), format!("example.com{SERVICE_VERSION}"));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_lazily_after_ttl() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.insert("k".to_string(), meta());
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get("k").is_some());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_expired_entries() {
        let cache = MemoryCache::new(Duration::from_secs(30));
        cache.insert("a".to_string(), meta());
        cache.insert("b".to_string(), meta());
        cache.spawn_eviction_task(Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(61)).await;
        // let the sweeper task run
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.is_empty());
    }
}
