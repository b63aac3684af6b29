//! # AWS SQS Implementation
//!
//! Sends verified events to the verified-webhooks queue. The Stripe event ID
//! and type travel as message attributes so consumers can deduplicate and
//! route without parsing the body.

use crate::queue::{
    message_body, EventPublisher, MessageId, QueueError, QueueMessage, EVENT_ID_ATTRIBUTE,
    EVENT_TYPE_ATTRIBUTE,
};
use crate::webhook::VerifiedEvent;
use async_trait::async_trait;
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_sqs::types::MessageAttributeValue;
use tracing::{debug, error, instrument};

/// Event publisher backed by an SQS queue
#[derive(Debug, Clone)]
pub struct SqsEventPublisher {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsEventPublisher {
    /// Wrap an existing client
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Build a client from the default credential and region chain
    pub async fn from_env(queue_url: impl Into<String>) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_sqs::Client::new(&sdk_config), queue_url)
    }
}

fn string_attribute(value: &str) -> Result<MessageAttributeValue, QueueError> {
    MessageAttributeValue::builder()
        .data_type("String")
        .string_value(value)
        .build()
        .map_err(|e| QueueError::Serialization {
            message: e.to_string(),
        })
}

/// Map an SQS error code onto the queue's error taxonomy
pub(crate) fn classify_error(code: Option<&str>, detail: String) -> QueueError {
    match code {
        Some("ThrottlingException")
        | Some("RequestThrottled")
        | Some("AWS.SimpleQueueService.RequestThrottled")
        | Some("KmsThrottled") => QueueError::Throttled { message: detail },
        Some("InvalidMessageContents") => QueueError::Serialization { message: detail },
        _ => QueueError::Unavailable { message: detail },
    }
}

#[async_trait]
impl EventPublisher for SqsEventPublisher {
    #[instrument(skip(self, event), fields(event_id = %event.id, queue = %self.queue_url))]
    async fn publish(&self, event: &VerifiedEvent) -> Result<QueueMessage, QueueError> {
        let body = message_body(event)?;

        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .message_attributes(EVENT_ID_ATTRIBUTE, string_attribute(&event.id)?)
            .message_attributes(EVENT_TYPE_ATTRIBUTE, string_attribute(&event.event_type)?)
            .send()
            .await
            .map_err(|e| {
                let detail = DisplayErrorContext(&e).to_string();
                error!(error = %detail, "SQS send_message failed");
                classify_error(e.code(), detail)
            })?;

        let message_id = output
            .message_id()
            .map(MessageId::new)
            .unwrap_or_else(MessageId::generate);

        debug!(message_id = %message_id, "Event sent to SQS");

        Ok(QueueMessage::for_event(message_id, event))
    }

    fn queue_identifier(&self) -> &str {
        &self.queue_url
    }
}

#[cfg(test)]
#[path = "aws_sqs_tests.rs"]
mod tests;
