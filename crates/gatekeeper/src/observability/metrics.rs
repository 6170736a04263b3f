//! Metrics definitions for the gatekeeper.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gk_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: known static paths, everything else is `/other`
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: authorized, unauthenticated, forbidden
//! - `error_type`: bounded by `AuthError` variants
//! - `result`: hit, miss, shared

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Token validation
/// buckets are finer than HTTP buckets because the gate runs on every
/// protected request and a cold JWKS fetch dominates its tail.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gk_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gk_token_validation".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set token validation buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gk_jwks_fetch".to_string()),
            &[0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gk_http_requests_total`, `gk_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// This captures ALL HTTP responses, including framework-level 404/405 and
/// the gate's own 401/403 denials.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gk_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("gk_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        // Unknown paths normalized to "/other" to bound cardinality
        _ => "/other",
    }
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record one gate decision
///
/// Metric: `gk_token_validations_total`, `gk_token_validation_duration_seconds`
/// Labels: `outcome`, `error_type`
///
/// `error_type` is `"none"` for authorized requests.
pub fn record_token_validation(outcome: &str, error_type: Option<&str>, duration: Duration) {
    histogram!("gk_token_validation_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("gk_token_validations_total",
        "outcome" => outcome.to_string(),
        "error_type" => error_type.unwrap_or("none").to_string()
    )
    .increment(1);
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a JWKS fetch
///
/// Metric: `gk_jwks_fetches_total`, `gk_jwks_fetch_duration_seconds`
/// Labels: `status` (success, error, timeout)
pub fn record_jwks_fetch(status: &str, duration: Duration) {
    histogram!("gk_jwks_fetch_duration_seconds").record(duration.as_secs_f64());

    counter!("gk_jwks_fetches_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a key cache lookup
///
/// Metric: `gk_jwks_cache_lookups_total`
/// Labels: `result`
/// - `hit`: served from the cache
/// - `miss`: this caller fetched the key set
/// - `shared`: answered by another caller's concurrent refresh
pub fn record_jwks_cache_lookup(result: &'static str) {
    counter!("gk_jwks_cache_lookups_total",
        "result" => result
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
