//! No-op cache store: disables response caching entirely.

use async_trait::async_trait;
use std::time::Duration;
use tutorly_core::cache::CacheStore;
use tutorly_core::error::CacheError;

/// A cache store that stores nothing; every lookup is a miss.
pub struct NoopCacheStore;

#[async_trait]
impl CacheStore for NoopCacheStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Ok(())
    }

    async fn del(&self, _key: &str) -> Result<usize, CacheError> {
        Ok(0)
    }

    async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }
}
