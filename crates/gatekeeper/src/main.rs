//! Gatekeeper
//!
//! Entry point for the bearer-token gate service.

use gatekeeper::config::Config;
use gatekeeper::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Gatekeeper");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        tenant_id = %config.tenant_id,
        bind_address = %config.bind_address,
        jwt_clock_skew_seconds = config.jwt_clock_skew.as_secs(),
        jwks_cache_ttl_seconds = config.jwks_cache_ttl.as_secs(),
        policy_is_empty = config.api_policy.is_empty(),
        group_table_rows = config.group_table.len(),
        "Configuration loaded successfully"
    );

    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let bind_address = config.bind_address.clone();
    let drain_seconds = config.drain_seconds;

    let state = Arc::new(AppState::new(config));
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Gatekeeper listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain_seconds))
    .await?;

    info!("Gatekeeper shutdown complete");

    Ok(())
}

/// Install the tracing subscriber. `LOG_FORMAT=json` selects JSON output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gatekeeper=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Resolves once SIGINT or SIGTERM arrives and the drain period has elapsed.
///
/// In-flight requests keep being served while draining; new connections are
/// refused as soon as axum observes the signal.
async fn shutdown_signal(drain_secs: u64) {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
        "SIGINT"
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&str>();

    let received = tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    };
    info!(signal = received, "Shutdown requested");

    if drain_secs == 0 {
        return;
    }

    warn!(drain_seconds = drain_secs, "Draining in-flight requests");
    tokio::time::sleep(Duration::from_secs(drain_secs)).await;
    info!("Drain period complete");
}
