//! # Prometheus Metrics
//!
//! Operational metrics for the node, scraped at `/metrics` on the metrics
//! port. Everything lives in a dedicated [`prometheus::Registry`] under the
//! `cyan` namespace.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Metric handles shared by the API handlers and the sweep task.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Plans created, by kind (`bnpl`, `pawn`).
    pub plans_created_total: IntCounterVec,
    /// Status transitions, by target status.
    pub transitions_total: IntCounterVec,
    /// Installment payments accepted.
    pub payments_total: IntCounter,
    /// Engine operations that returned an error, by operation.
    pub failed_operations_total: IntCounterVec,
    /// Plans moved to default by the sweep.
    pub swept_defaults_total: IntCounter,
    /// Plans currently held by the engine.
    pub plans: IntGauge,
    /// Principal lent out across all vaults, in whole units of 1e18.
    pub outstanding_principal: Gauge,
    /// Wall time of engine operations.
    pub operation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("cyan".into()), None)
            .expect("failed to create prometheus registry");

        let plans_created_total = IntCounterVec::new(
            Opts::new("plans_created_total", "Plans created, by kind"),
            &["kind"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(plans_created_total.clone()))
            .expect("metric registration");

        let transitions_total = IntCounterVec::new(
            Opts::new("plan_transitions_total", "Plan status transitions, by target status"),
            &["status"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("metric registration");

        let payments_total = IntCounter::new("payments_total", "Installment payments accepted")
            .expect("metric creation");
        registry
            .register(Box::new(payments_total.clone()))
            .expect("metric registration");

        let failed_operations_total = IntCounterVec::new(
            Opts::new(
                "failed_operations_total",
                "Engine operations that returned an error, by operation",
            ),
            &["operation"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(failed_operations_total.clone()))
            .expect("metric registration");

        let swept_defaults_total = IntCounter::new(
            "swept_defaults_total",
            "Plans moved to default by the periodic sweep",
        )
        .expect("metric creation");
        registry
            .register(Box::new(swept_defaults_total.clone()))
            .expect("metric registration");

        let plans = IntGauge::new("plans", "Plans held by the engine").expect("metric creation");
        registry
            .register(Box::new(plans.clone()))
            .expect("metric registration");

        let outstanding_principal = Gauge::new(
            "outstanding_principal",
            "Principal lent out across all vaults, in units of 1e18",
        )
        .expect("metric creation");
        registry
            .register(Box::new(outstanding_principal.clone()))
            .expect("metric registration");

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Engine operation latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            plans_created_total,
            transitions_total,
            payments_total,
            failed_operations_total,
            swept_defaults_total,
            plans,
            outstanding_principal,
            operation_latency_seconds,
        }
    }

    pub fn record_failure(&self, operation: &str) {
        self.failed_operations_total
            .with_label_values(&[operation])
            .inc();
    }

    pub fn record_transition(&self, status: &str) {
        self.transitions_total.with_label_values(&[status]).inc();
    }

    /// Refresh the gauges from engine totals.
    pub fn observe_book(&self, plan_count: usize, outstanding: u128) {
        self.plans.set(plan_count as i64);
        self.outstanding_principal.set(outstanding as f64 / 1e18);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// Renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
