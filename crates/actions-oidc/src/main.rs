//! Actions OIDC demo server
//!
//! Serves `/health` and a protected `/api/claims` endpoint that echoes the
//! verified claims of a GitHub Actions identity token.

use actions_oidc::auth::JwksClient;
use actions_oidc::config::Config;
use actions_oidc::routes::{self, AppState};
use actions_oidc::tasks::start_jwks_refresher;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "actions_oidc=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Actions OIDC demo server");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        audience = %config.verification.expected_audience,
        key_endpoints = ?config.verification.key_endpoints,
        clock_skew_secs = config.verification.clock_skew().as_secs(),
        refresh_interval_secs = config.refresh_interval.map(|i| i.as_secs()),
        required_claims = ?config.required_claims.constrained_fields().collect::<Vec<_>>(),
        "Configuration loaded successfully"
    );

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_address))?;

    let jwks_client = Arc::new(JwksClient::from_options(&config.verification));

    let cancel_token = CancellationToken::new();
    let refresher = config.refresh_interval.map(|refresh_interval| {
        tokio::spawn(start_jwks_refresher(
            jwks_client.clone(),
            refresh_interval,
            cancel_token.clone(),
        ))
    });

    let state = Arc::new(AppState {
        config,
        jwks_client,
    });
    let app = routes::build_routes(state);

    info!("Actions OIDC demo server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel_token.cancel();
    if let Some(refresher) = refresher {
        if let Err(e) = refresher.await {
            error!("JWKS refresh task failed: {}", e);
        }
    }

    info!("Actions OIDC demo server shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
