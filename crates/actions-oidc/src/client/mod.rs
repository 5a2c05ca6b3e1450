//! Client side: requesting an identity token from inside a GitHub Actions job.
//!
//! # Components
//!
//! - `token_request` - Token request configuration and client

pub mod token_request;

pub use token_request::{ActionsTokenClient, TokenRequestConfig, TokenRequestError};
