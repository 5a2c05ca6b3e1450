//! # OIDC Test Utilities
//!
//! Shared test utilities for the actions-oidc crate.
//!
//! This crate provides:
//! - Deterministic Ed25519 signing keys (TestKeypair)
//! - GitHub Actions claim builders (TestClaimsBuilder)
//! - A mock JWKS endpoint (MockJwksServer)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oidc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::new(1, "key-1");
//!     let jwks = MockJwksServer::start().await;
//!     jwks.serve_keys(&[&keypair]).await;
//!
//!     let token = keypair.sign(&TestClaimsBuilder::new().audience("my-aud").build());
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use token_builders::*;
