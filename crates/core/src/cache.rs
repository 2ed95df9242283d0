//! Cache store trait: TTL key/value storage for response payloads.
//!
//! Entries are owned by the store. Callers only exchange keys and string
//! payloads; expiry is evaluated lazily when an entry is read.
//!
//! Each operation must be atomic with respect to the others. An in-process
//! store gets this from its lock; a shared backend must provide it itself.

use crate::error::CacheError;
use async_trait::async_trait;
use std::time::Duration;

/// The core CacheStore trait.
///
/// Implementations: in-memory, none (no-op).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The backend name (e.g., "memory", "none").
    fn name(&self) -> &str;

    /// Fetch a live value. Expired entries are evicted and reported as a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Upsert a value. `ttl = None` falls back to the store's default, if any.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Remove a key, returning how many entries were deleted.
    async fn del(&self, key: &str) -> Result<usize, CacheError>;

    /// Whether a live entry exists for the key.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
}
