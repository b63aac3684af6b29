//! # In-Memory Secret Store
//!
//! Thread-safe in-memory implementation for testing and development.
//! Failures and latency can be injected to exercise the verifier's
//! dependency-failure paths.

use crate::secrets::{SecretError, SecretName, SecretStore, SecretValue};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, PoisonError, RwLock,
    },
    time::Duration,
};

/// In-memory secret store
#[derive(Clone, Default)]
pub struct InMemorySecretStore {
    secrets: Arc<RwLock<HashMap<SecretName, SecretValue>>>,
    failure: Arc<RwLock<Option<SecretError>>>,
    latency: Arc<RwLock<Option<Duration>>>,
    lookups: Arc<AtomicUsize>,
}

impl InMemorySecretStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`add_secret`](Self::add_secret)
    pub fn with_secret(self, name: SecretName, value: SecretValue) -> Self {
        self.add_secret(name, value);
        self
    }

    /// Add or replace a secret
    pub fn add_secret(&self, name: SecretName, value: SecretValue) {
        self.secrets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, value);
    }

    /// Remove a secret
    pub fn remove_secret(&self, name: &SecretName) {
        self.secrets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    /// Make every lookup fail with `error` (or clear with `None`)
    pub fn set_failure(&self, error: Option<SecretError>) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Delay every lookup by `latency` (or clear with `None`)
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Number of lookups served so far, including failed ones
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for InMemorySecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("InMemorySecretStore")
            .field("secret_count", &count)
            .field("lookups", &self.lookup_count())
            .finish()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_secret(&self, name: &SecretName) -> Result<SecretValue, SecretError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self
            .failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(error) = failure {
            return Err(error);
        }

        self.secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound {
                name: name.to_string(),
            })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[path = "memory_secret_store_tests.rs"]
mod tests;
