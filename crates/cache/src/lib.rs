//! Cache store implementations for tutorly.

pub mod in_memory;
pub mod noop;

use std::sync::Arc;
use std::time::Duration;

use tutorly_core::cache::CacheStore;

pub use in_memory::InMemoryCacheStore;
pub use noop::NoopCacheStore;

/// Build the cache store selected by `cache.backend`.
///
/// The store is constructed once at process start and injected into the
/// gateway; nothing in the workspace holds a global cache.
pub fn build_from_config(config: &tutorly_config::AppConfig) -> Arc<dyn CacheStore> {
    match config.cache.backend.as_str() {
        "none" => Arc::new(NoopCacheStore),
        _ => Arc::new(
            InMemoryCacheStore::new().with_default_ttl(Duration::from_secs(config.cache.ttl_secs)),
        ),
    }
}
