//! # AWS Secrets Manager Implementation
//!
//! Reads secrets with the ambient AWS credentials (the execution role when
//! deployed). The receiver only ever needs `secretsmanager:GetSecretValue`.

use crate::secrets::{SecretError, SecretName, SecretStore, SecretValue};
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata};
use tracing::{debug, error, instrument};

/// Secret store backed by AWS Secrets Manager
#[derive(Debug, Clone)]
pub struct AwsSecretsManagerStore {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretsManagerStore {
    /// Wrap an existing client
    pub fn new(client: aws_sdk_secretsmanager::Client) -> Self {
        Self { client }
    }

    /// Build a client from the default credential and region chain
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_secretsmanager::Client::new(&sdk_config))
    }
}

/// Map a Secrets Manager error code onto the store's error taxonomy
pub(crate) fn classify_error(name: &SecretName, code: Option<&str>, detail: String) -> SecretError {
    match code {
        Some("ResourceNotFoundException") => SecretError::NotFound {
            name: name.to_string(),
        },
        Some("AccessDeniedException") | Some("DecryptionFailure") => SecretError::AccessDenied {
            name: name.to_string(),
        },
        _ => SecretError::Unavailable { message: detail },
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManagerStore {
    #[instrument(skip(self), fields(secret_name = %name))]
    async fn get_secret(&self, name: &SecretName) -> Result<SecretValue, SecretError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(name.as_str())
            .send()
            .await
            .map_err(|e| {
                let detail = DisplayErrorContext(&e).to_string();
                error!(error = %detail, "Failed to read secret from Secrets Manager");
                classify_error(name, e.code(), detail)
            })?;

        let value = output
            .secret_string()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SecretError::InvalidValue {
                name: name.to_string(),
            })?;

        debug!(version = ?output.version_id(), "Secret read from Secrets Manager");

        Ok(SecretValue::from_string(value.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "aws-secrets-manager"
    }
}

#[cfg(test)]
#[path = "aws_secrets_manager_tests.rs"]
mod tests;
