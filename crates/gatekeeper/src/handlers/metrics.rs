//! Prometheus metrics endpoint handler.
//!
//! Unauthenticated so Prometheus can scrape it. Metrics carry only bounded
//! operational labels, never token contents.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// ```text
/// # TYPE gk_token_validations_total counter
/// gk_token_validations_total{outcome="unauthenticated",error_type="TokenExpired"} 3
/// ```
#[tracing::instrument(skip_all, name = "gk.handlers.metrics")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
