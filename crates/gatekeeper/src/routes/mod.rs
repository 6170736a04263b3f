//! HTTP routes for the gatekeeper.
//!
//! Defines the Axum router and application state.

use crate::auth::{AuthGate, JwksClient, JwtValidator};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, AuthLayer};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// The authorization gate, shared by every protected route.
    pub gate: Arc<AuthGate>,
}

impl AppState {
    /// Wire the key cache, validator and gate from configuration.
    pub fn new(config: Config) -> Self {
        let jwks_client = Arc::new(JwksClient::with_settings(
            config.tenant(),
            config.jwks_cache_ttl,
            config.jwks_fetch_timeout,
        ));
        let validator = Arc::new(JwtValidator::new(jwks_client, config.jwt_clock_skew));
        let gate = Arc::new(AuthGate::new(
            validator,
            Arc::new(config.group_table.clone()),
        ));

        Self { config, gate }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness check (simple "OK") - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/me` - Caller summary - protected by the configured API policy
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route_layer(AuthLayer::new(
            Arc::clone(&state.gate),
            state.config.api_policy.clone(),
        ));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let vars = HashMap::from([
            ("AZURE_TENANT_ID".to_string(), "tenant-1".to_string()),
            ("AZURE_CLIENT_ID".to_string(), "client-1".to_string()),
            // Never contacted by these tests
            ("AUTHORITY_HOST".to_string(), "http://127.0.0.1:9".to_string()),
        ]);
        let state = Arc::new(AppState::new(Config::from_vars(&vars).unwrap()));
        let handle = PrometheusBuilder::new().build_recorder().handle();
        build_routes(state, handle)
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let response = test_app()
            .oneshot(Request::builder().uri("/api/v1/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = test_app()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
