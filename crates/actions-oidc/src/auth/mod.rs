//! Token verification core.
//!
//! # Components
//!
//! - `jwks` - Key resolution with per-endpoint snapshots and refresh-on-miss
//! - `jwt` - Token verification (signature, time window, audience)
//! - `claims` - Typed GitHub Actions identity claims
//! - `policy` - Partial-match authorization against a required claim pattern

pub mod claims;
pub mod jwks;
pub mod jwt;
pub mod policy;

pub use claims::{ActionsClaims, IdentityClaims, RegisteredClaims};
pub use jwks::{JwksClient, KeyResolver, KeySet, ResolveError, StaticKeyResolver};
pub use jwt::TokenVerifier;
pub use policy::{matches, RequiredPattern};
