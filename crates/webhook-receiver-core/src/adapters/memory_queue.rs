//! # In-Memory Event Publisher
//!
//! Records published events instead of sending them anywhere. Used for local
//! development and by the test suites.
//!
//! The buffer holds at most [`DEFAULT_MEMORY_QUEUE_CAPACITY`] messages unless
//! configured otherwise; the oldest message is dropped to make room.

use crate::queue::{message_body, EventPublisher, MessageId, QueueError, QueueMessage};
use crate::webhook::VerifiedEvent;
use async_trait::async_trait;
use std::{
    collections::VecDeque,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};
use tracing::debug;

/// Identifier reported by the default in-memory queue
pub const DEFAULT_MEMORY_QUEUE: &str = "memory://stripe-verified-webhooks-queue";

/// Messages retained by an in-memory queue before the oldest is dropped
pub const DEFAULT_MEMORY_QUEUE_CAPACITY: usize = 10_000;

/// In-memory event publisher
#[derive(Debug, Clone)]
pub struct InMemoryEventPublisher {
    queue_identifier: String,
    capacity: usize,
    messages: Arc<RwLock<VecDeque<QueueMessage>>>,
    failure: Arc<RwLock<Option<QueueError>>>,
    latency: Arc<RwLock<Option<Duration>>>,
}

impl InMemoryEventPublisher {
    /// Create a publisher reporting the given queue identifier
    pub fn new(queue_identifier: impl Into<String>) -> Self {
        Self {
            queue_identifier: queue_identifier.into(),
            capacity: DEFAULT_MEMORY_QUEUE_CAPACITY,
            messages: Arc::new(RwLock::new(VecDeque::new())),
            failure: Arc::new(RwLock::new(None)),
            latency: Arc::new(RwLock::new(None)),
        }
    }

    /// Retain at most `capacity` messages (minimum one)
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Maximum number of retained messages
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the retained messages, oldest first
    pub fn published_messages(&self) -> Vec<QueueMessage> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Number of retained messages
    pub fn published_count(&self) -> usize {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Make every publish fail with `error` (or clear with `None`)
    pub fn set_failure(&self, error: Option<QueueError>) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Delay every publish by `latency` (or clear with `None`)
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().unwrap_or_else(PoisonError::into_inner) = latency;
    }
}

impl Default for InMemoryEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_QUEUE)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: &VerifiedEvent) -> Result<QueueMessage, QueueError> {
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

        // Same size rules as the real queue
        message_body(event)?;

        let message = QueueMessage::for_event(MessageId::generate(), event);
        {
            let mut messages = self.messages.write().unwrap_or_else(PoisonError::into_inner);
            if messages.len() >= self.capacity {
                if let Some(dropped) = messages.pop_front() {
                    debug!(
                        message_id = %dropped.message_id,
                        capacity = self.capacity,
                        "Memory queue full, dropping oldest message"
                    );
                }
            }
            messages.push_back(message.clone());
        }

        debug!(
            message_id = %message.message_id,
            queue = %self.queue_identifier,
            "Event recorded in memory queue"
        );

        Ok(message)
    }

    fn queue_identifier(&self) -> &str {
        &self.queue_identifier
    }
}

#[cfg(test)]
#[path = "memory_queue_tests.rs"]
mod tests;
