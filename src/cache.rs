//! Stale-response caching for open-circuit fallbacks.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

/// A cache of previously successful response bodies, keyed by resource
/// and caller.
///
/// The admission monitor writes to the cache on every attributable
/// success and reads from it while the circuit is open, so refused
/// callers can be served their last known good response instead of an
/// error.
pub trait FallbackCache: Send + Sync {
    /// Whether a value is cached under the key.
    fn has(&self, key: &str) -> bool;

    /// Gets the cached value for the key, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores a value under the key, replacing any previous one.
    fn set(&self, key: &str, value: String);
}

/// An unbounded in-process [`FallbackCache`].
///
/// Clones share the same underlying map, so one cache can back several
/// monitors. Entries never expire; size is bounded only by the number of
/// distinct keys, which is the resource and caller product.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    inner: Arc<RwLock<AHashMap<String, String>>>,
}

impl InMemoryCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl FallbackCache for InMemoryCache {
    fn has(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.inner.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.inner.write().insert(key.to_string(), value);
    }
}
