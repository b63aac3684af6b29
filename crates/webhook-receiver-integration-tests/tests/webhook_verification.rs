//! Integration tests for webhook verification through the HTTP front door
//!
//! Every test drives the real router and verifier; only the secret store and
//! queue are in-memory.

mod common;

use axum::http::StatusCode;
use common::*;
use std::time::Duration;
use webhook_receiver_api::ServiceConfig;
use webhook_receiver_core::{QueueError, SecretError, VerifierConfig};

// ============================================================================
// Accepted deliveries
// ============================================================================

#[tokio::test]
async fn test_end_to_end_valid_event_is_published() {
    let receiver = TestReceiver::new();
    let signature = signature_for(EVENT_BODY, now());

    let response = receiver
        .send(webhook_request(EVENT_BODY, Some(&signature)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "accepted");
    assert_eq!(json["event_id"], "evt_1");
    assert!(json["message_id"].as_str().is_some());

    let published = receiver.queue.published_messages();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].payload["id"], "evt_1");
    assert_eq!(published[0].event_type, "payment.succeeded");
}

#[tokio::test]
async fn test_valid_signature_publishes_exactly_once() {
    let receiver = TestReceiver::new();

    for i in 0..5 {
        let body = format!(r#"{{"id":"evt_{}","type":"charge.succeeded"}}"#, i);
        let signature = signature_for(&body, now());

        let response = receiver.send(webhook_request(&body, Some(&signature))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(receiver.queue.published_count(), i + 1);
    }
}

#[tokio::test]
async fn test_replayed_request_is_published_twice() {
    let receiver = TestReceiver::new();
    let signature = signature_for(EVENT_BODY, now());

    for _ in 0..2 {
        let response = receiver
            .send(webhook_request(EVENT_BODY, Some(&signature)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let published = receiver.queue.published_messages();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].event_id, published[1].event_id);
    assert_ne!(published[0].message_id, published[1].message_id);
}

#[tokio::test]
async fn test_any_matching_v1_entry_is_accepted() {
    let receiver = TestReceiver::new();
    let timestamp = now();
    let valid = signature_for(EVENT_BODY, timestamp);
    let valid_sig = valid.split("v1=").nth(1).unwrap();
    let header = format!(
        "t={},v1={},v1={},v0={}",
        timestamp,
        "0".repeat(64),
        valid_sig,
        "f".repeat(64)
    );

    let response = receiver.send(webhook_request(EVENT_BODY, Some(&header))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(receiver.queue.published_count(), 1);
}

#[tokio::test]
async fn test_zero_tolerance_accepts_old_timestamp() {
    let receiver = TestReceiver::with_config(
        ServiceConfig::default(),
        VerifierConfig {
            tolerance: Duration::ZERO,
            ..VerifierConfig::default()
        },
    );
    let signature = signature_for(EVENT_BODY, now() - 86_400);

    let response = receiver
        .send(webhook_request(EVENT_BODY, Some(&signature)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Rejected deliveries
// ============================================================================

#[tokio::test]
async fn test_bit_flipped_signature_is_rejected() {
    let receiver = TestReceiver::new();
    let timestamp = now();
    let signature = signature_for(EVENT_BODY, timestamp);

    // Flip the lowest bit of the last hex digit
    let mut chars: Vec<char> = signature.chars().collect();
    let last = chars.len() - 1;
    let digit = chars[last].to_digit(16).unwrap() ^ 1;
    chars[last] = std::char::from_digit(digit, 16).unwrap();
    let tampered: String = chars.into_iter().collect();

    let response = receiver
        .send(webhook_request(EVENT_BODY, Some(&tampered)))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["reason"], "signature-mismatch");
    assert_eq!(receiver.queue.published_count(), 0);
}

#[tokio::test]
async fn test_modified_body_is_rejected() {
    let receiver = TestReceiver::new();
    let signature = signature_for(EVENT_BODY, now());

    let response = receiver
        .send(webhook_request(
            r#"{"id":"evt_1","type":"payment.failed"}"#,
            Some(&signature),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(receiver.queue.published_count(), 0);
}

#[tokio::test]
async fn test_stale_timestamp_is_rejected_even_with_valid_signature() {
    let receiver = TestReceiver::new();
    let signature = signature_for(EVENT_BODY, now() - 6 * 60);

    let response = receiver
        .send(webhook_request(EVENT_BODY, Some(&signature)))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["reason"],
        "timestamp-outside-tolerance"
    );
    assert_eq!(receiver.queue.published_count(), 0);
}

#[tokio::test]
async fn test_future_timestamp_is_rejected() {
    let receiver = TestReceiver::new();
    let signature = signature_for(EVENT_BODY, now() + 6 * 60);

    let response = receiver
        .send(webhook_request(EVENT_BODY, Some(&signature)))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(receiver.queue.published_count(), 0);
}

#[tokio::test]
async fn test_missing_header_is_rejected() {
    let receiver = TestReceiver::new();

    let response = receiver.send(webhook_request(EVENT_BODY, None)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["reason"],
        "missing-signature-header"
    );
    assert_eq!(receiver.queue.published_count(), 0);
}

#[tokio::test]
async fn test_header_without_v1_is_rejected() {
    let receiver = TestReceiver::new();
    let header = format!("t={},v0={}", now(), "a".repeat(64));

    let response = receiver.send(webhook_request(EVENT_BODY, Some(&header))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(receiver.queue.published_count(), 0);
}

#[tokio::test]
async fn test_signed_body_without_event_id_is_malformed() {
    let receiver = TestReceiver::new();
    let body = r#"{"type":"payment.succeeded"}"#;
    let signature = signature_for(body, now());

    let response = receiver.send(webhook_request(body, Some(&signature))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["reason"], "malformed-payload");
    assert_eq!(receiver.queue.published_count(), 0);
}

#[tokio::test]
async fn test_oversized_body_is_rejected_before_verification() {
    let mut config = ServiceConfig::default();
    config.server.max_body_size = 32;
    let receiver = TestReceiver::with_config(config, VerifierConfig::default());

    let body = format!(
        r#"{{"id":"evt_1","type":"payment.succeeded","pad":"{}"}}"#,
        "x".repeat(64)
    );
    let signature = signature_for(&body, now());

    let response = receiver.send(webhook_request(&body, Some(&signature))).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(receiver.secrets.lookup_count(), 0);
    assert_eq!(receiver.queue.published_count(), 0);
}

// ============================================================================
// Dependency failures
// ============================================================================

#[tokio::test]
async fn test_secret_store_failure_is_server_error_without_publish() {
    let receiver = TestReceiver::new();
    receiver.secrets.set_failure(Some(SecretError::Unavailable {
        message: "simulated outage".to_string(),
    }));
    let signature = signature_for(EVENT_BODY, now());

    let response = receiver
        .send(webhook_request(EVENT_BODY, Some(&signature)))
        .await;

    assert!(response.status().is_server_error());
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().contains_key("retry-after"));
    assert_eq!(json_body(response).await["reason"], "secret-unavailable");
    assert_eq!(receiver.queue.published_count(), 0);
}

#[tokio::test]
async fn test_missing_secret_is_server_error() {
    let receiver = TestReceiver::new();
    receiver.secrets.set_failure(Some(SecretError::NotFound {
        name: "stripe-webhook-signing-secret".to_string(),
    }));
    let signature = signature_for(EVENT_BODY, now());

    let response = receiver
        .send(webhook_request(EVENT_BODY, Some(&signature)))
        .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(receiver.queue.published_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_secret_store_times_out_without_publish() {
    let receiver = TestReceiver::with_config(ServiceConfig::default(), fast_timeouts());
    receiver.secrets.set_latency(Some(Duration::from_secs(60)));
    let signature = signature_for(EVENT_BODY, now());

    let response = receiver
        .send(webhook_request(EVENT_BODY, Some(&signature)))
        .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(receiver.queue.published_count(), 0);
}

#[tokio::test]
async fn test_throttled_queue_is_retryable() {
    let receiver = TestReceiver::new();
    receiver.queue.set_failure(Some(QueueError::Throttled {
        message: "rate exceeded".to_string(),
    }));
    let signature = signature_for(EVENT_BODY, now());

    let response = receiver
        .send(webhook_request(EVENT_BODY, Some(&signature)))
        .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.headers().get("retry-after").unwrap().to_str().unwrap(),
        "30"
    );
    assert_eq!(receiver.queue.published_count(), 0);
}

#[tokio::test]
async fn test_queue_recovers_after_outage() {
    let receiver = TestReceiver::new();
    let signature = signature_for(EVENT_BODY, now());

    receiver.queue.set_failure(Some(QueueError::Unavailable {
        message: "down".to_string(),
    }));
    let first = receiver
        .send(webhook_request(EVENT_BODY, Some(&signature)))
        .await;
    assert_eq!(first.status(), StatusCode::SERVICE_UNAVAILABLE);

    receiver.queue.set_failure(None);
    let second = receiver
        .send(webhook_request(EVENT_BODY, Some(&signature)))
        .await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(receiver.queue.published_count(), 1);
}
