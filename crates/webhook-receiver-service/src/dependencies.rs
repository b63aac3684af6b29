//! Construction of the secret store and event publisher from configuration.

use std::{sync::Arc, time::Duration};
use tracing::info;
use webhook_receiver_api::{
    config::{QueueBackendConfig, SecretBackendConfig},
    ConfigError, ServiceConfig,
};
use webhook_receiver_core::{
    adapters::memory_queue::DEFAULT_MEMORY_QUEUE, CachedSecretStore, EventPublisher,
    InMemoryEventPublisher, InMemorySecretStore, SecretName, SecretStore, SecretValue,
};

/// Build the secret store selected by `secrets.backend`
///
/// The store is wrapped in a [`CachedSecretStore`] unless
/// `secrets.cache_ttl_seconds` is zero.
pub async fn build_secret_store(
    config: &ServiceConfig,
) -> Result<Arc<dyn SecretStore>, ConfigError> {
    let store: Arc<dyn SecretStore> = match &config.secrets.backend {
        SecretBackendConfig::Literal { value } => {
            let name = SecretName::new(config.secrets.signing_secret_name.as_str()).map_err(
                |e| ConfigError::Invalid {
                    message: format!("secrets.signing_secret_name: {}", e),
                },
            )?;
            Arc::new(
                InMemorySecretStore::new().with_secret(name, SecretValue::from_string(value.clone())),
            )
        }
        SecretBackendConfig::Aws => aws_secret_store().await?,
    };

    let ttl = config.secrets.cache_ttl_seconds;
    if ttl == 0 {
        info!(backend = store.backend_name(), "Secret caching disabled");
        return Ok(store);
    }

    info!(
        backend = store.backend_name(),
        ttl_seconds = ttl,
        "Caching secrets"
    );
    Ok(Arc::new(CachedSecretStore::new(
        store,
        Duration::from_secs(ttl),
    )))
}

/// Build the publisher selected by `queue.backend`
pub async fn build_publisher(
    config: &ServiceConfig,
) -> Result<Arc<dyn EventPublisher>, ConfigError> {
    match config.queue.backend {
        QueueBackendConfig::Memory => {
            let identifier = config
                .queue
                .queue_url
                .clone()
                .unwrap_or_else(|| DEFAULT_MEMORY_QUEUE.to_string());
            Ok(Arc::new(InMemoryEventPublisher::new(identifier)))
        }
        QueueBackendConfig::Aws => {
            let queue_url = config
                .queue
                .queue_url
                .clone()
                .ok_or_else(|| ConfigError::Missing {
                    key: "queue.queue_url".to_string(),
                })?;
            aws_publisher(queue_url).await
        }
    }
}

#[cfg(feature = "aws")]
async fn aws_secret_store() -> Result<Arc<dyn SecretStore>, ConfigError> {
    Ok(Arc::new(
        webhook_receiver_core::adapters::AwsSecretsManagerStore::from_env().await,
    ))
}

#[cfg(not(feature = "aws"))]
async fn aws_secret_store() -> Result<Arc<dyn SecretStore>, ConfigError> {
    Err(ConfigError::Invalid {
        message: "secrets.backend 'aws' requires the 'aws' feature".to_string(),
    })
}

#[cfg(feature = "aws")]
async fn aws_publisher(queue_url: String) -> Result<Arc<dyn EventPublisher>, ConfigError> {
    Ok(Arc::new(
        webhook_receiver_core::adapters::SqsEventPublisher::from_env(queue_url).await,
    ))
}

#[cfg(not(feature = "aws"))]
async fn aws_publisher(_queue_url: String) -> Result<Arc<dyn EventPublisher>, ConfigError> {
    Err(ConfigError::Invalid {
        message: "queue.backend 'aws' requires the 'aws' feature".to_string(),
    })
}

#[cfg(test)]
#[path = "dependencies_tests.rs"]
mod tests;
