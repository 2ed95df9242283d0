//! In-memory cache store: single-process, TTL-based.
//!
//! Expiry is lazy: an entry past its deadline is evicted by the read that
//! observes it. There is no background sweeper; `purge_expired` exists for
//! callers that want to reclaim memory explicitly.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::trace;
use tutorly_core::cache::CacheStore;
use tutorly_core::error::CacheError;

/// A stored value and its deadline (`None` = never expires).
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// An in-memory cache store backed by a `HashMap`.
///
/// Each operation takes the lock once, so get/set/del/exists are atomic
/// with respect to each other.
pub struct InMemoryCacheStore {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    default_ttl: Option<Duration>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_ttl: None,
        }
    }

    /// TTL applied when `set` is called without one. Zero means no expiry.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Number of entries held, including ones that expired but were not read yet.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    fn deadline(&self, ttl: Option<Duration>) -> Option<Instant> {
        ttl.or(self.default_ttl)
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| Instant::now() + ttl)
    }

    /// Look up a key, evicting it if expired.
    async fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                trace!(key, "evicting expired cache entry");
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.live_entry(key).await.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let entry = CacheEntry {
            value,
            expires_at: self.deadline(ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<usize, CacheError> {
        Ok(usize::from(self.entries.write().await.remove(key).is_some()))
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live_entry(key).await.is_some())
    }
}
