//! Health check handler.

use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Response for `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,

    /// Keys currently cached across all key endpoints.
    pub cached_keys: usize,
}

/// Liveness probe.
///
/// Always reports healthy; keys load lazily, so an empty cache is not a failure.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "cached_keys": 2
/// }
/// ```
#[instrument(skip_all, name = "oidc.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        cached_keys: state.jwks_client.cached_key_count(),
    })
}
