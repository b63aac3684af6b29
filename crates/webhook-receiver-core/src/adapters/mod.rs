//! # Infrastructure Adapters
//!
//! Infrastructure implementations of the secret store and queue interfaces.

pub mod cached_secret_store;
pub mod memory_queue;
pub mod memory_secret_store;

#[cfg(feature = "aws")]
pub mod aws_secrets_manager;

#[cfg(feature = "aws")]
pub mod aws_sqs;

pub use cached_secret_store::CachedSecretStore;
pub use memory_queue::InMemoryEventPublisher;
pub use memory_secret_store::InMemorySecretStore;

#[cfg(feature = "aws")]
pub use aws_secrets_manager::AwsSecretsManagerStore;

#[cfg(feature = "aws")]
pub use aws_sqs::SqsEventPublisher;
