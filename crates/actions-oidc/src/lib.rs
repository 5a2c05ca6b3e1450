//! Actions OIDC Library
//!
//! Verifies GitHub Actions workload identity tokens and decides whether the
//! calling workflow is allowed to act as a given repository or environment.
//!
//! # Architecture
//!
//! ```text
//! raw credential -> auth::jwt (uses auth::jwks) -> auth::claims -> auth::policy -> allow/deny
//! ```
//!
//! The HTTP boundary (`middleware`, `routes`, `handlers`) and the token
//! request client (`client`) sit on top of the core and hold no verification
//! logic of their own.
//!
//! # Modules
//!
//! - `auth` - Key resolution, token verification, claims, policy matching
//! - `client` - Requests identity tokens from inside a workflow run
//! - `config` - Verification options and service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers for the demo server
//! - `middleware` - Axum middleware enforcing token verification and policy
//! - `observability` - Metrics for verification outcomes and key refreshes
//! - `routes` - Axum router setup
//! - `tasks` - Background key refresh

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod tasks;
