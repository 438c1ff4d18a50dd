//! Prometheus metrics for matty-server.
//!
//! Provides metrics collection, request tracking middleware and a
//! Prometheus-compatible `/metrics` endpoint.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// Metric names as constants for consistency
const HTTP_REQUESTS_TOTAL: &str = "matty_http_requests_total";
const HTTP_REQUEST_DURATION: &str = "matty_http_request_duration_seconds";
const DESIGN_OPERATIONS_TOTAL: &str = "matty_design_operations_total";
const DESIGNS_STORED: &str = "matty_designs_stored";
const EXPORTS_TOTAL: &str = "matty_exports_total";
const VALIDATION_FAILURES_TOTAL: &str = "matty_validation_failures_total";

/// Initialize metrics and return the Prometheus handle.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed
/// (e.g., if another recorder is already installed).
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record an HTTP request.
///
/// # Arguments
///
/// * `method` - HTTP method (GET, POST, etc.)
/// * `path` - Route pattern, e.g. `/api/designs/{id}`
/// * `status` - HTTP status code
/// * `duration_secs` - Request duration in seconds
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        HTTP_REQUEST_DURATION,
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

/// Record a design store operation.
///
/// # Arguments
///
/// * `operation` - "create", "list", "get", "update" or "delete"
/// * `success` - Whether the operation succeeded
pub fn record_design_operation(operation: &str, success: bool) {
    counter!(
        DESIGN_OPERATIONS_TOTAL,
        "operation" => operation.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
}

/// Update the number of stored designs.
#[allow(clippy::cast_precision_loss)]
pub fn set_designs_stored(count: usize) {
    gauge!(DESIGNS_STORED).set(count as f64);
}

/// Record a rendered export.
///
/// # Arguments
///
/// * `format` - "png" or "jpg"
pub fn record_export(format: &str) {
    counter!(EXPORTS_TOTAL, "format" => format.to_string()).increment(1);
}

/// Record an input validation failure.
///
/// # Arguments
///
/// * `validation_type` - What failed (owner_id, design_id, title, etc.)
pub fn record_validation_failure(validation_type: &str) {
    counter!(
        VALIDATION_FAILURES_TOTAL,
        "type" => validation_type.to_string()
    )
    .increment(1);
}

/// Middleware recording count and duration of every routed request.
pub async fn track_http(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.extensions().get::<MatchedPath>().map_or_else(
        || request.uri().path().to_string(),
        |matched| matched.as_str().to_string(),
    );

    let response = next.run(request).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Prometheus metrics endpoint.
#[tracing::instrument(name = "metrics", skip(handle))]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
