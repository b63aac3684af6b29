//! # Verified-Event Queue Module
//!
//! Publishing of verified webhook events onto the downstream queue.
//!
//! The queue provides at-least-once delivery. Its dead-letter companion is
//! driven by the consumer's redrive policy; this service only ever sends.
//! Once published, a [`QueueMessage`] belongs to the queue.

use crate::webhook::VerifiedEvent;
use crate::Timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest message body accepted by SQS (256 KiB)
pub const MAX_MESSAGE_SIZE: usize = 262_144;

/// Message attribute carrying the Stripe event ID, for consumer-side dedup
pub const EVENT_ID_ATTRIBUTE: &str = "stripe-event-id";

/// Message attribute carrying the Stripe event type
pub const EVENT_TYPE_ATTRIBUTE: &str = "stripe-event-type";

// ============================================================================
// Core Types
// ============================================================================

/// Queue-assigned message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an identifier returned by the queue
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier (for queues that do not assign one)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A verified event together with its delivery envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Identifier assigned by the queue
    pub message_id: MessageId,

    /// When the queue accepted the message
    pub enqueued_at: Timestamp,

    /// Stripe event ID (also sent as a message attribute)
    pub event_id: String,

    /// Stripe event type (also sent as a message attribute)
    pub event_type: String,

    /// The verified event body
    pub payload: serde_json::Value,
}

impl QueueMessage {
    /// Build the envelope for an event accepted by the queue
    pub fn for_event(message_id: MessageId, event: &VerifiedEvent) -> Self {
        Self {
            message_id,
            enqueued_at: Timestamp::now(),
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
        }
    }
}

/// Serialize an event into the body sent to the queue
pub fn message_body(event: &VerifiedEvent) -> Result<String, QueueError> {
    let body = serde_json::to_string(&event.payload).map_err(|e| QueueError::Serialization {
        message: e.to_string(),
    })?;

    if body.len() > MAX_MESSAGE_SIZE {
        return Err(QueueError::MessageTooLarge {
            size: body.len(),
            max_size: MAX_MESSAGE_SIZE,
        });
    }

    Ok(body)
}

// ============================================================================
// Interface Traits
// ============================================================================

/// Send access to the verified-event queue
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a verified event, returning the accepted message
    ///
    /// # Errors
    /// - `QueueError::Unavailable` - Queue unreachable
    /// - `QueueError::Throttled` - Queue is rate limiting sends
    /// - `QueueError::MessageTooLarge` - Body exceeds the queue's limit
    async fn publish(&self, event: &VerifiedEvent) -> Result<QueueMessage, QueueError>;

    /// Identifier of the destination queue (URL for SQS)
    fn queue_identifier(&self) -> &str;
}

// ============================================================================
// Error Types
// ============================================================================

/// Queue publish errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Queue unavailable: {message}")]
    Unavailable { message: String },

    #[error("Queue throttled the send: {message}")]
    Throttled { message: String },

    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Publish timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Failed to serialize message: {message}")]
    Serialization { message: String },
}

impl QueueError {
    /// Check if error is transient and redelivery may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Throttled { .. } => true,
            Self::Timeout { .. } => true,
            Self::MessageTooLarge { .. } => false,
            Self::Serialization { .. } => false,
        }
    }

    /// Suggested delay before the sender retries, if any
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::Throttled { .. } => Some(30),
            Self::Unavailable { .. } | Self::Timeout { .. } => Some(60),
            Self::MessageTooLarge { .. } | Self::Serialization { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
