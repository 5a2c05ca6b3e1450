//! Actions OIDC token request demo
//!
//! Runs inside a workflow job with `id-token: write`. Requests an identity
//! token for `OIDC_AUDIENCE` and calls `OIDC_TARGET_URL` with it, e.g. the
//! demo server's `/api/claims` endpoint.

use actions_oidc::client::{ActionsTokenClient, TokenRequestConfig};
use anyhow::Context;
use secrecy::ExposeSecret;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_AUDIENCE: &str = "example-audience";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "actions_oidc=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let audience = env::var("OIDC_AUDIENCE").unwrap_or_else(|_| DEFAULT_AUDIENCE.to_string());
    let target_url = env::var("OIDC_TARGET_URL").context("OIDC_TARGET_URL must be set")?;

    let client = ActionsTokenClient::new(TokenRequestConfig::from_env()?);
    let token = client.request_token(&audience).await?;
    info!(audience = %audience, "Token request successful");

    let response = reqwest::Client::new()
        .get(&target_url)
        .bearer_auth(token.expose_secret())
        .send()
        .await
        .with_context(|| format!("Request to {} failed", target_url))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .context("Failed to read response body")?;

    if status.is_success() {
        info!(status = %status, body = %body, "Target accepted the token");
    } else {
        error!(status = %status, body = %body, "Target rejected the token");
        anyhow::bail!("target returned {}", status);
    }

    Ok(())
}
