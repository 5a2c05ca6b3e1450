//! Background tasks.
//!
//! # Tasks
//!
//! - `jwks_refresh` - Scheduled refresh of the key cache

pub mod jwks_refresh;

pub use jwks_refresh::start_jwks_refresher;
