//! Response types for the API.

use serde::{Deserialize, Serialize};
use webhook_receiver_core::{MessageId, QueueMessage, Timestamp};

/// Body returned when a verified event was queued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookAcceptedResponse {
    pub status: String,
    pub message_id: MessageId,
    pub event_id: String,
    pub event_type: String,
}

impl From<&QueueMessage> for WebhookAcceptedResponse {
    fn from(message: &QueueMessage) -> Self {
        Self {
            status: "accepted".to_string(),
            message_id: message.message_id.clone(),
            event_id: message.event_id.clone(),
            event_type: message.event_type.clone(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: Timestamp,
    pub uptime_seconds: u64,
}
