//! # Webhook Receiver Core
//!
//! Core logic for receiving Stripe webhook callbacks, verifying their
//! signatures, and publishing verified events to a durable queue.
//!
//! ## Architecture
//!
//! The verifier depends only on trait abstractions:
//! - [`secrets::SecretStore`] provides the webhook signing secret
//! - [`queue::EventPublisher`] accepts verified events
//!
//! Concrete implementations (in-memory, AWS Secrets Manager, AWS SQS) live in
//! [`adapters`] and are injected at startup.
//!
//! ## Usage
//!
//! ```rust
//! use webhook_receiver_core::Timestamp;
//!
//! let signed_at = Timestamp::from_unix_seconds(1_700_000_000).unwrap();
//! assert_eq!(signed_at.unix_seconds(), 1_700_000_000);
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Time and Metadata Types
// ============================================================================

/// UTC timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from seconds since the Unix epoch
    ///
    /// Returns `None` when the value is outside the range chrono can represent.
    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        Utc.timestamp_opt(seconds, 0).single().map(Self)
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Seconds since the Unix epoch
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    /// Absolute distance between two timestamps, in either direction
    pub fn abs_diff(&self, other: Self) -> Duration {
        self.0
            .signed_duration_since(other.0)
            .abs()
            .to_std()
            .unwrap_or(Duration::MAX)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for logging and alerting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures the webhook sender should retry
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Security-related failures (bad signatures, replayed requests)
    Security,
}

impl ErrorCategory {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Security => "security",
        }
    }
}

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },
}

// ============================================================================
// Module declarations
// ============================================================================

/// Secret store abstraction for the Stripe API key and signing secret
pub mod secrets;

/// Verified-event queue abstraction
pub mod queue;

/// `Stripe-Signature` header parsing and HMAC verification
pub mod signature;

/// Webhook verification pipeline
pub mod webhook;

/// Function environment and operator outputs
pub mod wiring;

/// Infrastructure implementations of the secret store and queue interfaces
pub mod adapters;

// Re-export key types for convenience
pub use adapters::{CachedSecretStore, InMemoryEventPublisher, InMemorySecretStore};
pub use queue::{EventPublisher, MessageId, QueueError, QueueMessage};
pub use secrets::{SecretError, SecretName, SecretStore, SecretValue, StandardSecrets};
pub use signature::{SignatureError, SignatureHeader, SignatureVerifier};
pub use webhook::{
    InvocationOutcome, RejectReason, VerificationResult, VerifiedEvent, VerifierConfig,
    WebhookHandler, WebhookRequest, WebhookVerifier,
};
pub use wiring::{DeploymentOutputs, FunctionEnvironment, WiringError};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
