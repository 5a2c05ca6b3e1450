//! Scheduled key refresh task.
//!
//! Refreshes every key endpoint on a fixed interval so that rotated keys are
//! usually cached before the first token signed with them arrives.
//! Refresh-on-miss still covers the gap between ticks.
//!
//! # Graceful Shutdown
//!
//! The task exits when its cancellation token is cancelled. A refresh in
//! progress is abandoned.

use crate::auth::JwksClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Start the key refresh background task.
///
/// The first refresh runs immediately, then once per `refresh_interval`.
/// Failures are logged and the previous keys stay in use.
///
/// # Arguments
///
/// * `jwks_client` - Key cache to refresh
/// * `refresh_interval` - Time between refreshes
/// * `cancel_token` - Token for graceful shutdown
///
/// # Returns
///
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "oidc.task.jwks_refresh")]
pub async fn start_jwks_refresher(
    jwks_client: Arc<JwksClient>,
    refresh_interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "oidc.task.jwks_refresh",
        refresh_interval_secs = refresh_interval.as_secs(),
        "Starting JWKS refresh task"
    );

    let mut interval = tokio::time::interval(refresh_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                info!(
                    target: "oidc.task.jwks_refresh",
                    "JWKS refresh task received shutdown signal, exiting"
                );
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = jwks_client.refresh().await {
                    warn!(
                        target: "oidc.task.jwks_refresh",
                        error = %e,
                        "Scheduled JWKS refresh failed"
                    );
                }
            }
        }
    }

    info!(target: "oidc.task.jwks_refresh", "JWKS refresh task stopped");
}
