//! HTTP routes for the demo server.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwksClient, TokenVerifier};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{require_actions_token, AuthState};
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,

    /// Shared key cache, also driven by the scheduled refresh task.
    pub jwks_client: Arc<JwksClient>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe - public
/// - `/api/claims` - Echo of the verified token claims - requires a token
///   matching the configured required claims
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>) -> Router {
    let verifier = Arc::new(TokenVerifier::new(
        state.jwks_client.clone(),
        &state.config.verification,
    ));
    let auth_state = Arc::new(AuthState {
        verifier,
        required: Arc::new(state.config.required_claims.clone()),
    });

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state);

    let protected_routes = Router::new()
        .route("/api/claims", get(handlers::get_claims))
        .route_layer(middleware::from_fn_with_state(
            auth_state,
            require_actions_token,
        ));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    public_routes
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
