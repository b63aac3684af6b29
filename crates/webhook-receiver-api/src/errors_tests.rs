//! Tests for HTTP error mapping.

use super::*;
use axum::body::to_bytes;

async fn response_json(response: Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ============================================================================
// Status code mapping
// ============================================================================

mod status_code_tests {
    use super::*;

    #[test]
    fn test_client_rejections_map_to_bad_request() {
        for reason in [
            RejectReason::MissingSignatureHeader,
            RejectReason::SignatureMismatch,
            RejectReason::TimestampOutsideTolerance,
            RejectReason::MalformedPayload,
        ] {
            assert_eq!(
                WebhookHandlerError::Rejected(reason).status_code(),
                StatusCode::BAD_REQUEST,
                "reason {:?}",
                reason
            );
        }
    }

    #[test]
    fn test_secret_unavailable_maps_to_service_unavailable() {
        let error = WebhookHandlerError::Rejected(RejectReason::SecretUnavailable);
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.retry_after_seconds(), Some(60));
    }

    #[test]
    fn test_transient_publish_failure_maps_to_service_unavailable() {
        let error = WebhookHandlerError::PublishFailed(QueueError::Throttled {
            message: "slow down".to_string(),
        });
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.retry_after_seconds(), Some(30));
    }

    #[test]
    fn test_permanent_publish_failure_maps_to_internal_error() {
        let error = WebhookHandlerError::PublishFailed(QueueError::MessageTooLarge {
            size: 300_000,
            max_size: 262_144,
        });
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.retry_after_seconds(), None);
    }

    #[test]
    fn test_payload_too_large_and_timeout() {
        assert_eq!(
            WebhookHandlerError::PayloadTooLarge { max_size: 10 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            WebhookHandlerError::Timeout { seconds: 30 }.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}

// ============================================================================
// Response body
// ============================================================================

mod response_body_tests {
    use super::*;

    #[tokio::test]
    async fn test_rejection_body_carries_reason() {
        let response =
            WebhookHandlerError::Rejected(RejectReason::SignatureMismatch).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get("Retry-After").is_none());

        let json = response_json(response).await;
        assert_eq!(json["reason"], "signature-mismatch");
        assert_eq!(json["status"], 400);
        assert!(json["error"].as_str().is_some());
        assert!(json["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_dependency_failure_sets_retry_after() {
        let response = WebhookHandlerError::PublishFailed(QueueError::Unavailable {
            message: "connection reset".to_string(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get("Retry-After").unwrap().to_str().unwrap(),
            "60"
        );

        let json = response_json(response).await;
        assert_eq!(json["reason"], "publish-failed");
    }

    #[tokio::test]
    async fn test_publish_failure_body_hides_dependency_detail() {
        let response = WebhookHandlerError::PublishFailed(QueueError::Unavailable {
            message: "arn:aws:sqs:internal-detail".to_string(),
        })
        .into_response();

        let json = response_json(response).await;
        assert!(!json.to_string().contains("internal-detail"));
    }
}
