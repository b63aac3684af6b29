//! # Secret Store Module
//!
//! Access to the secrets the receiver needs at runtime: the Stripe API key and
//! the webhook signing secret.
//!
//! Secret values are held in [`SecretValue`], which zeroizes its buffer on drop
//! and never prints its content in `Debug` output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Instant};
use zeroize::Zeroizing;

// ============================================================================
// Core Types
// ============================================================================

/// Secret identifier as understood by the secret store
///
/// Follows the AWS Secrets Manager naming rules so that names are portable
/// between the in-memory store and the real service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretName(String);

impl SecretName {
    /// Maximum length accepted by AWS Secrets Manager
    pub const MAX_LENGTH: usize = 512;

    /// Create new secret name with validation
    ///
    /// # Validation Rules
    /// - Must be 1-512 characters
    /// - Must contain only alphanumeric characters and `/_+=.@-`
    pub fn new(name: impl Into<String>) -> Result<Self, SecretError> {
        let name = name.into();

        if name.is_empty() {
            return Err(SecretError::InvalidName {
                name,
                reason: "Secret name cannot be empty".to_string(),
            });
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(SecretError::InvalidName {
                name,
                reason: format!(
                    "Secret name exceeds {} character limit",
                    Self::MAX_LENGTH
                ),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/_+=.@-".contains(c))
        {
            return Err(SecretError::InvalidName {
                name,
                reason: "Secret name contains invalid characters".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SecretName {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SecretName {
    type Error = SecretError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SecretName> for String {
    fn from(value: SecretName) -> Self {
        value.0
    }
}

/// Names of the secrets provisioned for the receiver
pub struct StandardSecrets;

impl StandardSecrets {
    /// Stripe API key secret name
    pub const API_KEY: &'static str = "stripe-api-key";

    /// Stripe webhook signing secret name
    pub const WEBHOOK_SIGNING_SECRET: &'static str = "stripe-webhook-signing-secret";

    /// Secret name for the Stripe API key
    pub fn api_key() -> SecretName {
        SecretName(Self::API_KEY.to_string())
    }

    /// Secret name for the webhook signing secret
    pub fn webhook_signing_secret() -> SecretName {
        SecretName(Self::WEBHOOK_SIGNING_SECRET.to_string())
    }
}

/// Secure container for secret values
///
/// The buffer is zeroized when the last copy is dropped. Secret values are
/// never included in Debug output or logs.
#[derive(Clone)]
pub struct SecretValue {
    inner: Zeroizing<String>,
}

impl SecretValue {
    /// Create secret value from string
    pub fn from_string(value: String) -> Self {
        Self {
            inner: Zeroizing::new(value),
        }
    }

    /// Get secret as string (only for immediate use)
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// Get secret as bytes
    pub fn expose_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Check if secret is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get secret length without exposing content
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("length", &self.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Cached secret with expiration metadata
///
/// Uses a monotonic clock so that wall-clock adjustments never extend the
/// lifetime of a cached value.
#[derive(Debug, Clone)]
pub struct CachedSecret {
    /// Secret value (secure container)
    pub value: SecretValue,

    /// When secret was cached
    pub cached_at: Instant,

    /// When the cached value stops being served (`None` never expires)
    pub expires_at: Option<Instant>,
}

impl CachedSecret {
    /// Check if secret is expired at the given instant
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }

    /// Check if secret is expired now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

// ============================================================================
// Interface Traits
// ============================================================================

/// Read access to a secret store
///
/// The verifier is granted read access only; secrets are created and rotated
/// outside of this service.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get secret value by name
    ///
    /// # Errors
    /// - `SecretError::NotFound` - Secret does not exist
    /// - `SecretError::AccessDenied` - Insufficient permissions
    /// - `SecretError::Unavailable` - Store unreachable
    async fn get_secret(&self, name: &SecretName) -> Result<SecretValue, SecretError>;

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

// ============================================================================
// Error Types
// ============================================================================

/// Secret store operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    #[error("Secret not found: {name}")]
    NotFound { name: String },

    #[error("Access denied to secret: {name}")]
    AccessDenied { name: String },

    #[error("Secret store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Secret lookup for '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("Secret '{name}' has no string value")]
    InvalidValue { name: String },

    #[error("Invalid secret name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

impl SecretError {
    /// Check if error is transient and a later attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Timeout { .. } => true,
            Self::NotFound { .. } => false,
            Self::AccessDenied { .. } => false,
            Self::InvalidValue { .. } => false,
            Self::InvalidName { .. } => false,
        }
    }
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;
