//! Metrics collection for the API service.
//!
//! Metrics live in a registry owned by [`ServiceMetrics`] rather than the
//! process-global one, so several routers (e.g. in tests) can coexist.

use prometheus::{
    Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::{sync::Arc, time::Duration};
use webhook_receiver_core::{InvocationOutcome, RejectReason};

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    /// Webhook invocations by outcome (`accepted`, `rejected`, `publish_failed`)
    pub webhook_requests_total: IntCounterVec,

    /// Rejections by reason
    pub webhook_rejections_total: IntCounterVec,

    /// Publish failures by kind (`transient`, `permanent`)
    pub queue_publish_failures_total: IntCounterVec,

    /// HTTP responses by status class (`2xx`, `4xx`, `5xx`)
    pub http_responses_total: IntCounterVec,

    /// Time from request to verification outcome
    pub webhook_duration_seconds: Histogram,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let webhook_requests_total = IntCounterVec::new(
            Opts::new("webhook_requests_total", "Webhook invocations by outcome"),
            &["outcome"],
        )?;
        let webhook_rejections_total = IntCounterVec::new(
            Opts::new("webhook_rejections_total", "Rejected webhooks by reason"),
            &["reason"],
        )?;
        let queue_publish_failures_total = IntCounterVec::new(
            Opts::new(
                "queue_publish_failures_total",
                "Verified events the queue did not accept",
            ),
            &["kind"],
        )?;
        let http_responses_total = IntCounterVec::new(
            Opts::new("http_responses_total", "HTTP responses by status class"),
            &["class"],
        )?;
        let webhook_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "webhook_duration_seconds",
                "Webhook verification and publish time",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )?;

        registry.register(Box::new(webhook_requests_total.clone()))?;
        registry.register(Box::new(webhook_rejections_total.clone()))?;
        registry.register(Box::new(queue_publish_failures_total.clone()))?;
        registry.register(Box::new(http_responses_total.clone()))?;
        registry.register(Box::new(webhook_duration_seconds.clone()))?;

        // Expose every rejection reason from the start, even at zero
        for reason in RejectReason::ALL {
            webhook_rejections_total.with_label_values(&[reason.as_str()]);
        }

        Ok(Arc::new(Self {
            registry,
            webhook_requests_total,
            webhook_rejections_total,
            queue_publish_failures_total,
            http_responses_total,
            webhook_duration_seconds,
        }))
    }

    /// Record the outcome of one invocation
    pub fn record_outcome(&self, outcome: &InvocationOutcome, duration: Duration) {
        self.webhook_requests_total
            .with_label_values(&[outcome.label()])
            .inc();
        self.webhook_duration_seconds
            .observe(duration.as_secs_f64());

        match outcome {
            InvocationOutcome::Accepted(_) => {}
            InvocationOutcome::Rejected(reason) => {
                self.webhook_rejections_total
                    .with_label_values(&[reason.as_str()])
                    .inc();
            }
            InvocationOutcome::PublishFailed(e) => {
                let kind = if e.is_transient() {
                    "transient"
                } else {
                    "permanent"
                };
                self.queue_publish_failures_total
                    .with_label_values(&[kind])
                    .inc();
            }
        }
    }

    /// Record an invocation that hit the request timeout
    pub fn record_timeout(&self, duration: Duration) {
        self.webhook_requests_total
            .with_label_values(&["timeout"])
            .inc();
        self.webhook_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record an HTTP response by status class
    pub fn record_http_response(&self, status: u16) {
        let class = match status {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            _ => "5xx",
        };
        self.http_responses_total.with_label_values(&[class]).inc();
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
