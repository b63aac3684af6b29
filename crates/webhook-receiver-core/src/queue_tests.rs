//! Tests for queue types.

use super::*;

fn sample_event(body: &str) -> VerifiedEvent {
    let signed_at = Timestamp::from_unix_seconds(1_700_000_000).unwrap();
    VerifiedEvent::from_body(body.as_bytes(), signed_at).unwrap()
}

#[test]
fn test_message_body_is_event_payload() {
    let event = sample_event(r#"{"id":"evt_1","type":"payment.succeeded","data":{"object":{}}}"#);

    let body = message_body(&event).unwrap();
    let reparsed: serde_json::Value = serde_json::from_str(&body).unwrap();

    assert_eq!(reparsed, event.payload);
}

#[test]
fn test_message_body_rejects_oversized_payload() {
    let filler = "x".repeat(MAX_MESSAGE_SIZE);
    let event = sample_event(&format!(
        r#"{{"id":"evt_big","type":"invoice.created","filler":"{}"}}"#,
        filler
    ));

    let result = message_body(&event);

    assert!(matches!(
        result,
        Err(QueueError::MessageTooLarge { max_size, .. }) if max_size == MAX_MESSAGE_SIZE
    ));
}

#[test]
fn test_envelope_carries_event_identity() {
    let event = sample_event(r#"{"id":"evt_1","type":"payment.succeeded"}"#);

    let message = QueueMessage::for_event(MessageId::new("msg-1"), &event);

    assert_eq!(message.message_id.as_str(), "msg-1");
    assert_eq!(message.event_id, "evt_1");
    assert_eq!(message.event_type, "payment.succeeded");
    assert_eq!(message.payload["id"], "evt_1");
}

#[test]
fn test_generated_message_ids_are_unique() {
    assert_ne!(MessageId::generate(), MessageId::generate());
}

#[test]
fn test_retry_hints_follow_transience() {
    let throttled = QueueError::Throttled {
        message: "rate".to_string(),
    };
    assert!(throttled.is_transient());
    assert_eq!(throttled.retry_after_seconds(), Some(30));

    let too_large = QueueError::MessageTooLarge {
        size: 300_000,
        max_size: MAX_MESSAGE_SIZE,
    };
    assert!(!too_large.is_transient());
    assert_eq!(too_large.retry_after_seconds(), None);
}
