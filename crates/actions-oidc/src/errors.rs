//! Actions OIDC error types.
//!
//! `VerificationError` carries the precise rejection reason for operator
//! logs. `ApiError` is what the HTTP boundary returns: every verification
//! failure collapses to the same generic 401 body so callers learn nothing
//! about why their token was refused.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Reasons a credential is rejected by the token verifier.
///
/// All variants are terminal for a single verification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("Missing credential")]
    MissingCredential,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Unknown signing key: {0}")]
    UnknownKey(String),

    #[error("Bad signature: {0}")]
    BadSignature(String),

    #[error("Token expired")]
    Expired,

    #[error("Token not yet valid")]
    NotYetValid,

    #[error("Audience mismatch")]
    AudienceMismatch,
}

impl VerificationError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationError::MissingCredential => "missing_credential",
            VerificationError::MalformedToken(_) => "malformed_token",
            VerificationError::UnknownKey(_) => "unknown_key",
            VerificationError::BadSignature(_) => "bad_signature",
            VerificationError::Expired => "expired",
            VerificationError::NotYetValid => "not_yet_valid",
            VerificationError::AudienceMismatch => "audience_mismatch",
        }
    }
}

/// Errors returned by the HTTP boundary.
///
/// Maps to HTTP status codes:
/// - Unauthorized: 401 Unauthorized
/// - Forbidden: 403 Forbidden
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] VerificationError),

    #[error("Forbidden: claims do not satisfy the required pattern")]
    Forbidden,
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden => 403,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                "The access token is invalid or expired",
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "The token is not authorized for this resource",
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"actions-oidc\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
