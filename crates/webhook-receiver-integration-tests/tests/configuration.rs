//! Integration tests for configuration loading and its effect on the router

mod common;

use axum::http::StatusCode;
use common::*;
use serial_test::serial;
use std::io::Write;
use webhook_receiver_api::{
    config::{QueueBackendConfig, SecretBackendConfig},
    ConfigLoader,
};

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write");
    file
}

#[test]
fn test_local_development_config_loads() {
    let file = config_file(
        r#"
server:
  host: 127.0.0.1
  port: 8181
verifier:
  tolerance_seconds: 120
secrets:
  backend:
    type: literal
    value: whsec_local
  cache_ttl_seconds: 0
queue:
  backend: memory
logging:
  json_format: true
"#,
    );

    let config = ConfigLoader::new()
        .with_file(file.path(), true)
        .load()
        .expect("config loads");

    config.validate().expect("config is valid");
    assert!(!config.requires_function_environment());
    assert_eq!(config.queue.backend, QueueBackendConfig::Memory);
    assert!(matches!(
        config.secrets.backend,
        SecretBackendConfig::Literal { .. }
    ));
    assert!(config.logging.json_format);

    let verifier = config.to_verifier_config().expect("verifier config");
    assert_eq!(verifier.tolerance.as_secs(), 120);
}

#[test]
fn test_malformed_file_is_an_error() {
    let file = config_file("server: [this is not a map");

    let result = ConfigLoader::new().with_file(file.path(), true).load();

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_environment_override_applies_to_loaded_file() {
    let file = config_file("verifier:\n  tolerance_seconds: 120\n");
    std::env::set_var("SWRIT__VERIFIER__TOLERANCE_SECONDS", "45");

    let result = ConfigLoader::new()
        .with_file(file.path(), true)
        .with_env_prefix("SWRIT")
        .load();

    std::env::remove_var("SWRIT__VERIFIER__TOLERANCE_SECONDS");

    assert_eq!(result.expect("config").verifier.tolerance_seconds, 45);
}

#[tokio::test]
async fn test_loaded_tolerance_drives_verification() {
    let file = config_file("verifier:\n  tolerance_seconds: 30\n");
    let config = ConfigLoader::new()
        .with_file(file.path(), true)
        .load()
        .expect("config");
    let verifier = config.to_verifier_config().expect("verifier config");

    let receiver = TestReceiver::with_config(config, verifier);

    // One minute old: inside the default window, outside the configured one
    let signature = signature_for(EVENT_BODY, now() - 60);
    let response = receiver
        .send(webhook_request(EVENT_BODY, Some(&signature)))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(receiver.queue.published_count(), 0);
}
