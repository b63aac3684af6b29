//! # Function Wiring
//!
//! The environment handed to the verifier function and the outputs reported
//! to operators.
//!
//! Missing environment is a cold-start failure, never a per-request one.

use crate::secrets::SecretName;
use serde::{Deserialize, Serialize};
use url::Url;

/// Environment variable naming the Stripe API key secret
pub const API_KEY_NAME_VAR: &str = "STRIPE_API_KEY_NAME";

/// Environment variable naming the webhook signing secret
pub const SIGNING_SECRET_NAME_VAR: &str = "STRIPE_WEBHOOK_SIGNING_SECRET_NAME";

/// Environment variable holding the verified-events queue URL
pub const VERIFIED_QUEUE_URL_VAR: &str = "SQS_VERIFIED_WEBHOOKS_URL";

// ============================================================================
// Function environment
// ============================================================================

/// Environment the verifier function is started with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionEnvironment {
    /// Secret holding the Stripe API key
    pub api_key_secret_name: SecretName,

    /// Secret holding the webhook signing secret
    pub signing_secret_name: SecretName,

    /// URL of the verified-events queue
    pub verified_queue_url: String,
}

impl FunctionEnvironment {
    /// Read the environment of the current process
    pub fn from_env() -> Result<Self, WiringError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the environment through `lookup`
    ///
    /// Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WiringError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| WiringError::MissingEnvVar {
                    name: name.to_string(),
                })
        };

        let secret_name = |var: &str| -> Result<SecretName, WiringError> {
            SecretName::new(require(var)?).map_err(|e| WiringError::InvalidValue {
                name: var.to_string(),
                message: e.to_string(),
            })
        };

        let api_key_secret_name = secret_name(API_KEY_NAME_VAR)?;
        let signing_secret_name = secret_name(SIGNING_SECRET_NAME_VAR)?;

        let verified_queue_url = require(VERIFIED_QUEUE_URL_VAR)?;
        Url::parse(&verified_queue_url).map_err(|e| WiringError::InvalidValue {
            name: VERIFIED_QUEUE_URL_VAR.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            api_key_secret_name,
            signing_secret_name,
            verified_queue_url,
        })
    }

    /// Environment variables to hand to the function, in a stable order
    pub fn to_vars(&self) -> Vec<(&'static str, String)> {
        vec![
            (API_KEY_NAME_VAR, self.api_key_secret_name.to_string()),
            (SIGNING_SECRET_NAME_VAR, self.signing_secret_name.to_string()),
            (VERIFIED_QUEUE_URL_VAR, self.verified_queue_url.clone()),
        ]
    }
}

// ============================================================================
// Operator outputs
// ============================================================================

/// Values operators need after deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentOutputs {
    /// Public URL to register as the Stripe webhook endpoint
    pub endpoint_url: String,

    /// Identifier of the queue consumers read verified events from
    pub verified_queue_url: String,
}

impl DeploymentOutputs {
    /// Export name of the endpoint URL
    pub const ENDPOINT_EXPORT: &'static str = "stripe-webhook-receiver-endpoint";

    /// Export name of the verified-events queue URL
    pub const VERIFIED_QUEUE_EXPORT: &'static str = "stripe-webhook-receiver-verified-queue";

    /// Create outputs
    pub fn new(endpoint_url: impl Into<String>, verified_queue_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            verified_queue_url: verified_queue_url.into(),
        }
    }

    /// Outputs keyed by export name
    pub fn as_pairs(&self) -> [(&'static str, &str); 2] {
        [
            (Self::ENDPOINT_EXPORT, self.endpoint_url.as_str()),
            (Self::VERIFIED_QUEUE_EXPORT, self.verified_queue_url.as_str()),
        ]
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Cold-start wiring errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WiringError {
    #[error("Required environment variable '{name}' is not set")]
    MissingEnvVar { name: String },

    #[error("Environment variable '{name}' is invalid: {message}")]
    InvalidValue { name: String, message: String },
}

#[cfg(test)]
#[path = "wiring_tests.rs"]
mod tests;
