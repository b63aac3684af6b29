//! # Stripe Webhook Receiver Service
//!
//! Binary entry point for the webhook receiver.
//!
//! This executable:
//! - Loads and validates configuration
//! - Initializes logging
//! - Reads the function environment and builds the secret store and queue
//! - Reports the operator outputs and starts the HTTP server

mod dependencies;

use std::{process, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use webhook_receiver_api::{
    config::LoggingConfig, start_server, ConfigLoader, ServiceConfig, ServiceError,
};
use webhook_receiver_core::{FunctionEnvironment, WebhookVerifier};

/// Filter used when neither `RUST_LOG` nor `logging.filter` is set
const DEFAULT_LOG_FILTER: &str = "webhook_receiver_service=info,webhook_receiver_api=info,webhook_receiver_core=info,tower_http=debug";

#[tokio::main]
async fn main() {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (later override earlier):
    //  1. /etc/stripe-webhook-receiver/service.yaml
    //  2. ./config/service.yaml
    //  3. Path given by SWR_CONFIG_FILE
    //  4. SWR__ environment variables, e.g. SWR__SERVER__PORT=9090
    //
    // Logging is configured from the result, so a load failure is reported
    // through a default subscriber.
    // -------------------------------------------------------------------------
    let loaded = ConfigLoader::standard(None).load();

    let mut service_config = match loaded {
        Ok(config) => {
            init_tracing(&config.logging);
            config
        }
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!(error = %e, "Failed to load configuration; aborting");
            process::exit(3);
        }
    };

    info!("Starting Stripe webhook receiver");

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        process::exit(3);
    }

    // -------------------------------------------------------------------------
    // Function environment
    //
    // Secret names and the queue URL are injected by the deployment. They are
    // only required when a cloud backend is selected.
    // -------------------------------------------------------------------------
    if service_config.requires_function_environment() {
        match FunctionEnvironment::from_env() {
            Ok(env) => {
                info!(
                    signing_secret_name = %env.signing_secret_name,
                    verified_queue_url = %env.verified_queue_url,
                    "Read function environment"
                );
                service_config.apply_function_environment(&env);
            }
            Err(e) => {
                error!(error = %e, "Function environment is incomplete; aborting");
                process::exit(3);
            }
        }
    }

    let verifier_config = match service_config.to_verifier_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid verifier settings; aborting");
            process::exit(3);
        }
    };

    // -------------------------------------------------------------------------
    // Capabilities
    // -------------------------------------------------------------------------
    let secrets = match dependencies::build_secret_store(&service_config).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Failed to build secret store; aborting");
            process::exit(3);
        }
    };

    let publisher = match dependencies::build_publisher(&service_config).await {
        Ok(publisher) => publisher,
        Err(e) => {
            error!(error = %e, "Failed to build event publisher; aborting");
            process::exit(3);
        }
    };

    if !service_config.requires_function_environment() {
        warn!("Running with local secret and queue backends; not for production use");
    }

    let outputs = service_config.deployment_outputs(publisher.queue_identifier());
    for (name, value) in outputs.as_pairs() {
        info!(output = name, value = value, "Deployment output");
    }

    let handler = Arc::new(WebhookVerifier::new(secrets, publisher, verifier_config));

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(service_config, handler).await {
        error!("Server stopped with error: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        process::exit(exit_code);
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over `logging.filter`, which wins over the built-in filter.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(logging.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
