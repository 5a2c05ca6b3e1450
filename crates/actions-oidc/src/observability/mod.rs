//! Observability for token verification.
//!
//! Uses the `metrics` facade; installing a recorder/exporter is left to the
//! embedding application. Without one, every call here is a no-op.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `oidc_token_verifications_total` | Counter | `outcome` | Accepted tokens and rejections by kind |
//! | `oidc_jwks_refresh_total` | Counter | `status` | Key refresh attempts |
//! | `oidc_policy_decisions_total` | Counter | `decision` | Required-claims checks at the HTTP boundary |

pub mod metrics;
