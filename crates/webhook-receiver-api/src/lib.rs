//! # Stripe Webhook Receiver HTTP Service
//!
//! HTTP front door for the Stripe webhook receiver.
//!
//! This service provides:
//! - The webhook endpoint on `/` (any method), forwarding to the verifier
//! - A liveness endpoint on `/health`
//! - Prometheus metrics on `/metrics`
//!
//! The router owns no verification logic. Every request on `/` becomes a
//! [`WebhookRequest`] handed to the injected [`WebhookHandler`], and the
//! [`InvocationOutcome`] is mapped onto an HTTP response.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod responses;

use axum::{
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{Json, Response},
    routing::{any, get},
    Router,
};
use bytes::Bytes;
use std::{
    collections::HashMap,
    future::IntoFuture,
    sync::Arc,
    time::{Duration, Instant},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};
use webhook_receiver_core::{InvocationOutcome, Timestamp, WebhookHandler, WebhookRequest};

pub use config::{ConfigLoader, ServiceConfig};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use metrics::ServiceMetrics;
pub use responses::{HealthResponse, WebhookAcceptedResponse};

/// Header carrying the request correlation ID
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub handler: Arc<dyn WebhookHandler>,
    pub metrics: Arc<ServiceMetrics>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        handler: Arc<dyn WebhookHandler>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            handler,
            metrics,
            started_at: Instant::now(),
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .route("/", any(handle_webhook))
        .route("/health", get(handle_health_check))
        .route("/metrics", get(metrics_endpoint))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    request_logging_middleware,
                ))
                .into_inner(),
        )
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
}

/// Start HTTP server
///
/// Runs until SIGINT or SIGTERM. In-flight requests get
/// `server.shutdown_timeout_seconds` to finish after the signal.
pub async fn start_server(
    config: ServiceConfig,
    handler: Arc<dyn WebhookHandler>,
) -> Result<(), ServiceError> {
    let metrics = ServiceMetrics::new().map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to initialize metrics: {}", e),
        })
    })?;

    let address = format!("{}:{}", config.server.host, config.server.port);
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let state = AppState::new(config, handler, metrics);
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;

    info!(address = %address, "Starting HTTP server");

    let (signalled_tx, mut signalled_rx) = tokio::sync::watch::channel(false);
    let graceful = async move {
        shutdown_signal(shutdown_timeout).await;
        let _ = signalled_tx.send(true);
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .into_future();
    tokio::pin!(server);

    let drain_deadline = async move {
        if signalled_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = &mut server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = drain_deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out, dropping in-flight requests"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolve when the process receives SIGINT or SIGTERM
async fn shutdown_signal(shutdown_timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
    }
}

// ============================================================================
// Webhook Handler
// ============================================================================

/// Handle a Stripe delivery
///
/// 1. Read the body (413 when it exceeds `server.max_body_size`)
/// 2. Hand headers and body to the verifier under the request timeout
/// 3. Map the outcome: accepted → 200, rejected → 400 (503 when the signing
///    secret was unavailable), publish failure → 503 or 500
#[instrument(skip(state, headers, body))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<WebhookAcceptedResponse>, WebhookHandlerError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            WebhookHandlerError::PayloadTooLarge {
                max_size: state.config.server.max_body_size,
            }
        } else {
            WebhookHandlerError::InvalidBody {
                message: rejection.body_text(),
            }
        }
    })?;

    info!(body_size = body.len(), "Received webhook request");

    let request = WebhookRequest::new(collect_headers(&headers), body);

    let timeout = state.config.request_timeout();
    let start = Instant::now();

    let outcome = match tokio::time::timeout(timeout, state.handler.handle_webhook(request)).await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            state.metrics.record_timeout(start.elapsed());
            return Err(WebhookHandlerError::Timeout {
                seconds: timeout.as_secs(),
            });
        }
    };

    state.metrics.record_outcome(&outcome, start.elapsed());

    match outcome {
        InvocationOutcome::Accepted(message) => {
            info!(
                message_id = %message.message_id,
                event_id = %message.event_id,
                event_type = %message.event_type,
                "Webhook accepted"
            );
            Ok(Json(WebhookAcceptedResponse::from(&message)))
        }
        InvocationOutcome::Rejected(reason) => Err(WebhookHandlerError::Rejected(reason)),
        InvocationOutcome::PublishFailed(e) => Err(WebhookHandlerError::PublishFailed(e)),
    }
}

/// Flatten request headers, keeping the first value of a repeated header
///
/// Header names arrive lower-cased from the http crate. Values that are not
/// visible ASCII are skipped.
fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut collected = HashMap::with_capacity(headers.keys_len());

    for name in headers.keys() {
        let mut values = headers.get_all(name).iter();
        let Some(first) = values.next() else {
            continue;
        };

        let extra = values.count();
        if extra > 0 {
            debug!(
                header = %name,
                ignored_values = extra,
                "Repeated header, keeping the first value"
            );
        }

        if let Ok(value) = first.to_str() {
            collected.insert(name.as_str().to_string(), value.to_string());
        }
    }

    collected
}

// ============================================================================
// Health and Observability
// ============================================================================

/// Liveness check
///
/// Reports the process only; the secret store and queue are not probed so a
/// dependency outage does not take the endpoint out of rotation.
#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "stripe-webhook-receiver".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Timestamp::now(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .encode()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Reuses the caller's `x-correlation-id` or generates one, echoes it on the
/// response, and logs completion at a level chosen by status class.
#[instrument(skip(state, request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    State(state): State<AppState>,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());

    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    let status = response.status();
    state.metrics.record_http_response(status.as_u16());

    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
