//! Tests for SQS error classification and attribute building

use super::*;

#[test]
fn test_throttling_codes_map_to_throttled() {
    for code in [
        "ThrottlingException",
        "RequestThrottled",
        "AWS.SimpleQueueService.RequestThrottled",
        "KmsThrottled",
    ] {
        let error = classify_error(Some(code), "slow down".to_string());
        assert!(matches!(error, QueueError::Throttled { .. }), "{code}");
        assert_eq!(error.retry_after_seconds(), Some(30));
    }
}

#[test]
fn test_invalid_contents_is_permanent() {
    let error = classify_error(Some("InvalidMessageContents"), "bad".to_string());
    assert!(!error.is_transient());
}

#[test]
fn test_other_failures_are_unavailable() {
    let error = classify_error(Some("QueueDoesNotExist"), "gone".to_string());
    assert_eq!(
        error,
        QueueError::Unavailable {
            message: "gone".to_string()
        }
    );
    assert!(classify_error(None, "timeout".to_string()).is_transient());
}

#[test]
fn test_string_attribute_is_typed() {
    let attribute = string_attribute("evt_1").unwrap();
    assert_eq!(attribute.data_type(), "String");
    assert_eq!(attribute.string_value(), Some("evt_1"));
}
