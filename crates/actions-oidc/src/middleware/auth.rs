//! Authentication middleware for protected routes.
//!
//! Reads the Authorization header, verifies the token, checks the verified
//! claims against the required pattern, and injects the claims into request
//! extensions.

use crate::auth::policy::first_mismatch;
use crate::auth::{ActionsClaims, RequiredPattern, TokenVerifier};
use crate::errors::{ApiError, VerificationError};
use crate::observability::metrics::record_policy_decision;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<TokenVerifier>,

    /// Claims every accepted token must carry.
    pub required: Arc<RequiredPattern>,
}

/// Middleware that admits only verified tokens matching the required pattern.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 401 Unauthorized with WWW-Authenticate header if the token is missing or fails verification
/// - 403 Forbidden if the token is valid but its claims do not match
/// - Otherwise continues with `ActionsClaims` in request extensions
#[instrument(skip_all, name = "oidc.middleware.auth")]
pub async fn require_actions_token(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let credential = match req.headers().get(AUTHORIZATION) {
        None => "",
        Some(value) => value.to_str().map_err(|_| {
            reject(VerificationError::MalformedToken(
                "Authorization header is not valid UTF-8".to_string(),
            ))
        })?,
    };

    let claims = state.verifier.verify(credential).await.map_err(reject)?;

    if let Some(field) = first_mismatch(&claims, &state.required) {
        record_policy_decision(false);
        tracing::info!(
            target: "oidc.middleware.auth",
            repository = %claims.repository(),
            subject = %claims.subject(),
            field = field,
            "Token claims do not satisfy required pattern"
        );
        return Err(ApiError::Forbidden);
    }
    record_policy_decision(true);

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

fn reject(error: VerificationError) -> ApiError {
    tracing::info!(
        target: "oidc.middleware.auth",
        kind = error.kind(),
        error = %error,
        "Rejected request credential"
    );
    ApiError::Unauthorized(error)
}

/// Extension trait for extracting verified claims from a request.
pub trait ClaimsExt {
    /// Returns `None` if the auth middleware was not applied to this request.
    fn actions_claims(&self) -> Option<&ActionsClaims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn actions_claims(&self) -> Option<&ActionsClaims> {
        self.extensions().get::<ActionsClaims>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    // Signed-token scenarios live in the integration tests, which have the
    // signing fixtures.

    use super::*;
    use crate::auth::jwks::{JwksResponse, StaticKeyResolver};
    use crate::config::VerificationOptions;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        let resolver = StaticKeyResolver::new(JwksResponse { keys: Vec::new() });
        let state = Arc::new(AuthState {
            verifier: Arc::new(TokenVerifier::new(
                Arc::new(resolver),
                &VerificationOptions::new("my-aud"),
            )),
            required: Arc::new(RequiredPattern::new()),
        });

        Router::new()
            .route("/", get(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(state, require_actions_token))
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_claims_ext_without_middleware() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert!(req.actions_claims().is_none());
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("WWW-Authenticate"));
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
