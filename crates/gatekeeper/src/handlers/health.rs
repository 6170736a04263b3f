//! Liveness check.

use tracing::instrument;

/// Handler for GET /health
///
/// Returns plain `OK`. Public and dependency-free: the JWKS endpoint being
/// unreachable does not make the process unhealthy, it only denies tokens.
#[instrument(skip_all, name = "gk.handlers.health")]
pub async fn health_check() -> &'static str {
    "OK"
}
