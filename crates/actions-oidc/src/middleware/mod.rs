//! HTTP middleware.
//!
//! # Components
//!
//! - `auth` - Token verification and required-claims check for protected routes

pub mod auth;

pub use auth::{require_actions_token, AuthState, ClaimsExt};
