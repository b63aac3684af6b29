//! Tests for function wiring.

use super::*;
use serial_test::serial;
use std::collections::HashMap;

const QUEUE_URL: &str = "https://sqs.eu-west-1.amazonaws.com/123456789012/stripe-verified-webhooks-queue";

fn full_env() -> HashMap<&'static str, String> {
    HashMap::from([
        (API_KEY_NAME_VAR, "stripe-api-key".to_string()),
        (
            SIGNING_SECRET_NAME_VAR,
            "stripe-webhook-signing-secret".to_string(),
        ),
        (VERIFIED_QUEUE_URL_VAR, QUEUE_URL.to_string()),
    ])
}

fn from_map(env: &HashMap<&'static str, String>) -> Result<FunctionEnvironment, WiringError> {
    FunctionEnvironment::from_lookup(|name| env.get(name).cloned())
}

// ============================================================================
// from_lookup
// ============================================================================

#[test]
fn test_complete_environment_is_read() {
    let env = from_map(&full_env()).unwrap();

    assert_eq!(env.api_key_secret_name.as_str(), "stripe-api-key");
    assert_eq!(
        env.signing_secret_name.as_str(),
        "stripe-webhook-signing-secret"
    );
    assert_eq!(env.verified_queue_url, QUEUE_URL);
}

#[test]
fn test_each_missing_variable_is_reported() {
    for var in [API_KEY_NAME_VAR, SIGNING_SECRET_NAME_VAR, VERIFIED_QUEUE_URL_VAR] {
        let mut env = full_env();
        env.remove(var);

        assert_eq!(
            from_map(&env),
            Err(WiringError::MissingEnvVar {
                name: var.to_string()
            })
        );
    }
}

#[test]
fn test_blank_variable_counts_as_missing() {
    let mut env = full_env();
    env.insert(SIGNING_SECRET_NAME_VAR, "   ".to_string());

    assert!(matches!(
        from_map(&env),
        Err(WiringError::MissingEnvVar { name }) if name == SIGNING_SECRET_NAME_VAR
    ));
}

#[test]
fn test_invalid_secret_name_is_rejected() {
    let mut env = full_env();
    env.insert(API_KEY_NAME_VAR, "stripe api key".to_string());

    assert!(matches!(
        from_map(&env),
        Err(WiringError::InvalidValue { name, .. }) if name == API_KEY_NAME_VAR
    ));
}

#[test]
fn test_queue_url_must_be_a_url() {
    let mut env = full_env();
    env.insert(VERIFIED_QUEUE_URL_VAR, "stripe-verified-webhooks-queue".to_string());

    assert!(matches!(
        from_map(&env),
        Err(WiringError::InvalidValue { name, .. }) if name == VERIFIED_QUEUE_URL_VAR
    ));
}

#[test]
fn test_to_vars_round_trips_through_lookup() {
    let env = from_map(&full_env()).unwrap();
    let vars: HashMap<&str, String> = env.to_vars().into_iter().collect();

    let reread = FunctionEnvironment::from_lookup(|name| vars.get(name).cloned()).unwrap();
    assert_eq!(reread, env);
}

// ============================================================================
// from_env (process environment)
// ============================================================================

#[test]
#[serial]
fn test_from_env_reads_process_environment() {
    for (name, value) in full_env() {
        std::env::set_var(name, value);
    }

    let result = FunctionEnvironment::from_env();

    for name in full_env().keys() {
        std::env::remove_var(name);
    }

    assert_eq!(result.unwrap().verified_queue_url, QUEUE_URL);
}

#[test]
#[serial]
fn test_from_env_fails_when_unset() {
    for name in full_env().keys() {
        std::env::remove_var(name);
    }

    assert!(matches!(
        FunctionEnvironment::from_env(),
        Err(WiringError::MissingEnvVar { .. })
    ));
}

// ============================================================================
// Outputs
// ============================================================================

#[test]
fn test_outputs_use_export_names() {
    let outputs = DeploymentOutputs::new("https://abc123.execute-api.eu-west-1.amazonaws.com", QUEUE_URL);

    let pairs = outputs.as_pairs();
    assert_eq!(pairs[0].0, "stripe-webhook-receiver-endpoint");
    assert_eq!(pairs[0].1, "https://abc123.execute-api.eu-west-1.amazonaws.com");
    assert_eq!(pairs[1].0, "stripe-webhook-receiver-verified-queue");
    assert_eq!(pairs[1].1, QUEUE_URL);
}
