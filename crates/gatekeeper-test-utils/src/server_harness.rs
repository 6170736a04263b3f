//! Test server harness for E2E testing
//!
//! Provides `TestGatekeeperServer` for spawning real gatekeeper instances
//! against a [`MockJwks`] directory.

use crate::jwks_harness::MockJwks;
use crate::token_builders::{TEST_CLIENT_ID, TEST_TENANT_ID};
use gatekeeper::config::Config;
use gatekeeper::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the gatekeeper in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_me_requires_token() -> Result<()> {
///     let jwks = MockJwks::start().await;
///     let server = TestGatekeeperServer::spawn(&jwks).await?;
///
///     let response = reqwest::get(format!("{}/api/v1/me", server.url())).await?;
///
///     assert_eq!(response.status(), 401);
///     Ok(())
/// }
/// ```
pub struct TestGatekeeperServer {
    addr: SocketAddr,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestGatekeeperServer {
    /// Spawn with the default test tenant and an authenticated-only policy.
    pub async fn spawn(jwks: &MockJwks) -> Result<Self, anyhow::Error> {
        Self::spawn_with(jwks, HashMap::new()).await
    }

    /// Spawn with extra environment variables layered over the defaults,
    /// e.g. `API_SCOPES_ANY` or `GROUP_TABLE`.
    ///
    /// The server binds 127.0.0.1:0 and runs in the background until the
    /// harness is dropped.
    pub async fn spawn_with(
        jwks: &MockJwks,
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("AZURE_TENANT_ID".to_string(), TEST_TENANT_ID.to_string()),
            ("AZURE_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("AUTHORITY_HOST".to_string(), jwks.authority_host()),
            ("STS_HOST".to_string(), jwks.sts_host()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
            ("DRAIN_SECONDS".to_string(), "0".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        // Not installed globally so several servers can coexist in one process
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let state = Arc::new(AppState::new(config.clone()));
        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestGatekeeperServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
