//! HTTP request handlers for the demo server.

pub mod claims;
pub mod health;

pub use claims::get_claims;
pub use health::health_check;
