//! Verified-claims echo handler.

use crate::auth::ActionsClaims;
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /api/claims
///
/// Returns the verified claims of the caller's token as a flat JSON object.
/// Requires the auth middleware.
///
/// ## Response
///
/// ```json
/// {
///   "iss": "https://token.actions.githubusercontent.com",
///   "sub": "repo:acme/widgets:ref:refs/heads/main",
///   "aud": ["my-aud"],
///   "repository": "acme/widgets",
///   "repository_owner": "acme",
///   "ref": "refs/heads/main",
///   ...
/// }
/// ```
#[instrument(skip_all, name = "oidc.handlers.claims")]
pub async fn get_claims(Extension(claims): Extension<ActionsClaims>) -> Json<ActionsClaims> {
    tracing::debug!(
        target: "oidc.handlers.claims",
        repository = %claims.repository(),
        "Returning verified claims"
    );
    Json(claims)
}
