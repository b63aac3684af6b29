//! Tests for the in-memory event publisher

use super::*;
use crate::Timestamp;

fn event(id: &str) -> VerifiedEvent {
    let body = format!(r#"{{"id":"{}","type":"charge.succeeded"}}"#, id);
    VerifiedEvent::from_body(body.as_bytes(), Timestamp::now()).unwrap()
}

#[tokio::test]
async fn test_publish_records_messages_in_order() {
    let publisher = InMemoryEventPublisher::default();

    let first = publisher.publish(&event("evt_1")).await.unwrap();
    let second = publisher.publish(&event("evt_2")).await.unwrap();

    assert_ne!(first.message_id, second.message_id);

    let messages = publisher.published_messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].event_id, "evt_1");
    assert_eq!(messages[1].event_id, "evt_2");
}

#[tokio::test]
async fn test_same_event_published_twice_is_kept_twice() {
    let publisher = InMemoryEventPublisher::default();

    publisher.publish(&event("evt_1")).await.unwrap();
    publisher.publish(&event("evt_1")).await.unwrap();

    assert_eq!(publisher.published_count(), 2);
}

#[tokio::test]
async fn test_injected_failure_records_nothing() {
    let publisher = InMemoryEventPublisher::new("memory://test");
    publisher.set_failure(Some(QueueError::Throttled {
        message: "slow down".to_string(),
    }));

    let result = publisher.publish(&event("evt_1")).await;

    assert!(matches!(result, Err(QueueError::Throttled { .. })));
    assert_eq!(publisher.published_count(), 0);
    assert_eq!(publisher.queue_identifier(), "memory://test");
}

#[tokio::test]
async fn test_full_buffer_drops_oldest_message() {
    let publisher = InMemoryEventPublisher::default().with_capacity(2);

    for id in ["evt_1", "evt_2", "evt_3"] {
        publisher.publish(&event(id)).await.unwrap();
    }

    let messages = publisher.published_messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].event_id, "evt_2");
    assert_eq!(messages[1].event_id, "evt_3");
}

#[test]
fn test_default_capacity_is_bounded() {
    let publisher = InMemoryEventPublisher::default();
    assert_eq!(publisher.capacity(), DEFAULT_MEMORY_QUEUE_CAPACITY);
    assert_eq!(publisher.with_capacity(0).capacity(), 1);
}

#[test]
fn test_default_identifier() {
    assert_eq!(
        InMemoryEventPublisher::default().queue_identifier(),
        DEFAULT_MEMORY_QUEUE
    );
}
