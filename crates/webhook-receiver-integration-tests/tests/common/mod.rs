//! Common test utilities for the webhook receiver integration tests
//!
//! This module provides:
//! - A router wired to the real verifier over in-memory capabilities
//! - Helpers for signing payloads the way Stripe does
//! - Request builders and response readers

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use std::{sync::Arc, time::Duration};
use webhook_receiver_api::{create_router, AppState, ServiceConfig, ServiceMetrics};
use webhook_receiver_core::{
    signature::sign_payload, InMemoryEventPublisher, InMemorySecretStore, SecretValue,
    StandardSecrets, Timestamp, VerifierConfig, WebhookVerifier,
};

/// Signing secret known to the test secret store
pub const TEST_SECRET: &str = "whsec_integration_test_secret";

/// Body from the end-to-end scenario
pub const EVENT_BODY: &str = r#"{"id":"evt_1","type":"payment.succeeded"}"#;

/// A router plus handles on its in-memory capabilities
#[allow(dead_code)]
pub struct TestReceiver {
    pub router: Router,
    pub secrets: InMemorySecretStore,
    pub queue: Arc<InMemoryEventPublisher>,
    pub state: AppState,
}

impl TestReceiver {
    /// Receiver with default configuration
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default(), VerifierConfig::default())
    }

    /// Receiver with the given configuration
    pub fn with_config(service: ServiceConfig, verifier: VerifierConfig) -> Self {
        let secrets = InMemorySecretStore::new().with_secret(
            StandardSecrets::webhook_signing_secret(),
            SecretValue::from_string(TEST_SECRET.to_string()),
        );
        let queue = Arc::new(InMemoryEventPublisher::default());

        let verifier = WebhookVerifier::new(Arc::new(secrets.clone()), queue.clone(), verifier);
        let state = AppState::new(
            service,
            Arc::new(verifier),
            ServiceMetrics::new().expect("metrics"),
        );

        Self {
            router: create_router(state.clone()),
            secrets,
            queue,
            state,
        }
    }

    /// Send one request through a fresh clone of the router
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

/// Stripe-Signature header for `body` signed at `timestamp` with the test secret
pub fn signature_for(body: &str, timestamp: i64) -> String {
    sign_payload(TEST_SECRET.as_bytes(), timestamp, body.as_bytes())
        .expect("HMAC accepts any key length")
        .to_string()
}

/// Current time in seconds since the epoch
pub fn now() -> i64 {
    Timestamp::now().unix_seconds()
}

/// POST `/` with the given body and optional signature header
pub fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json");

    if let Some(signature) = signature {
        builder = builder.header("Stripe-Signature", signature);
    }

    builder.body(Body::from(body.to_string())).expect("request")
}

/// Read a response body as JSON
#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// A verifier configuration with short dependency timeouts
#[allow(dead_code)]
pub fn fast_timeouts() -> VerifierConfig {
    VerifierConfig {
        dependency_timeout: Duration::from_millis(200),
        ..VerifierConfig::default()
    }
}
