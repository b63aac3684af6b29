//! # Cached Secret Store
//!
//! TTL cache in front of another [`SecretStore`].
//!
//! The cache is read-mostly. Lookups take the read lock only; a miss fetches
//! from the inner store without holding any lock and then inserts the result.
//! Concurrent refreshes for the same name race and the last write wins, which
//! is harmless because every writer stores a value the inner store returned.
//!
//! An expired entry is never served, even when the refresh fails. After a
//! secret rotation the old value may be used for up to one TTL.

use crate::secrets::{CachedSecret, SecretError, SecretName, SecretStore, SecretValue};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::debug;

/// Secret store wrapper that caches values for a fixed TTL
pub struct CachedSecretStore {
    inner: Arc<dyn SecretStore>,
    ttl: Duration,
    entries: RwLock<HashMap<SecretName, CachedSecret>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedSecretStore {
    /// Wrap `inner`, caching each value for `ttl`
    pub fn new(inner: Arc<dyn SecretStore>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop the cached value for `name`
    pub async fn invalidate(&self, name: &SecretName) {
        self.entries.write().await.remove(name);
    }

    /// Drop every cached value
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Lookups answered from the cache
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups forwarded to the inner store
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for CachedSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSecretStore")
            .field("backend", &self.inner.backend_name())
            .field("ttl", &self.ttl)
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}

#[async_trait]
impl SecretStore for CachedSecretStore {
    async fn get_secret(&self, name: &SecretName) -> Result<SecretValue, SecretError> {
        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(name) {
                if !cached.is_expired() {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(cached.value.clone());
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(secret_name = %name, "Secret cache miss");

        let value = match self.inner.get_secret(name).await {
            Ok(value) => value,
            Err(e) => {
                // Do not let a stale entry outlive a failed refresh
                let mut entries = self.entries.write().await;
                if entries.get(name).is_some_and(CachedSecret::is_expired) {
                    entries.remove(name);
                }
                return Err(e);
            }
        };

        let now = Instant::now();
        let cached = CachedSecret {
            value: value.clone(),
            cached_at: now,
            // A TTL past the end of the clock keeps the entry forever
            expires_at: now.checked_add(self.ttl),
        };
        self.entries.write().await.insert(name.clone(), cached);

        Ok(value)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

#[cfg(test)]
#[path = "cached_secret_store_tests.rs"]
mod tests;
