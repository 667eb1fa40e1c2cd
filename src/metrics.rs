//! Prometheus metrics. Recording must never fail or block a storage
//! operation; everything here is fire-and-forget counters.

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::time::Duration;

use crate::error::{AppError, Result};

lazy_static! {
    /// Storage operations by outcome
    pub static ref STORAGE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "stratus_storage_operations_total",
        "Storage operations by backend and outcome",
        &["operation", "backend", "outcome"]
    )
    .unwrap();

    /// Storage operation latency
    pub static ref STORAGE_OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "stratus_storage_operation_duration_seconds",
        "Storage operation duration in seconds",
        &["operation", "backend"],
        vec![0.005, 0.025, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 60.0]
    )
    .unwrap();

    /// Payload volume per operation
    pub static ref STORAGE_BYTES_TRANSFERRED: IntCounterVec = register_int_counter_vec!(
        "stratus_storage_bytes_transferred_total",
        "Bytes moved through storage operations",
        &["operation", "backend"]
    )
    .unwrap();

    /// Reconciliation sweep passes
    pub static ref RECONCILE_RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "stratus_reconcile_runs_total",
        "Reconciliation sweep passes by outcome",
        &["outcome"]
    )
    .unwrap();

    /// Objects reclaimed by the sweep
    pub static ref RECONCILE_REMOVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "stratus_reconcile_removed_total",
        "Objects removed by the reconciliation sweep",
        &["kind"]
    )
    .unwrap();

    /// HTTP traffic by route and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "stratus_http_requests_total",
        "HTTP requests by method, route and status",
        &["method", "path", "status"]
    )
    .unwrap();
}

/// Record one storage operation outcome
pub fn observe_storage_operation(
    operation: &str,
    backend: &str,
    outcome: &str,
    duration: Duration,
    bytes: Option<usize>,
) {
    STORAGE_OPERATIONS_TOTAL
        .with_label_values(&[operation, backend, outcome])
        .inc();
    STORAGE_OPERATION_DURATION
        .with_label_values(&[operation, backend])
        .observe(duration.as_secs_f64());
    if let Some(bytes) = bytes {
        STORAGE_BYTES_TRANSFERRED
            .with_label_values(&[operation, backend])
            .inc_by(bytes as u64);
    }
}

pub fn observe_reconcile_run(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    RECONCILE_RUNS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn observe_reconcile_removed(kind: &str, count: u64) {
    if count > 0 {
        RECONCILE_REMOVED_TOTAL.with_label_values(&[kind]).inc_by(count);
    }
}

/// Export all metrics in Prometheus text format
pub fn export() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(format!("Metrics encoding failed: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| AppError::Internal(format!("Metrics not UTF-8: {}", e)))
}

/// Request-counting middleware. Uses the matched route template so label
/// cardinality stays bounded regardless of path parameters.
pub async fn track_http(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, response.status().as_str()])
        .inc();

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_contains_registered_metrics() {
        observe_storage_operation("put", "local", "ok", Duration::from_millis(5), Some(128));
        observe_reconcile_removed("stale_intent", 2);
        let text = export().unwrap();
        assert!(text.contains("stratus_storage_operations_total"));
        assert!(text.contains("stratus_reconcile_removed_total"));
    }
}
