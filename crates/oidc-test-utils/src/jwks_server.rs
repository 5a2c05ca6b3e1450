//! Mock JWKS endpoint
//!
//! Wraps a `wiremock::MockServer` serving a key set at `/.well-known/jwks`.
//! The served keys (or a failure) can be swapped mid-test to simulate key
//! rotation and outages, and the number of fetches can be inspected.

use crate::crypto_fixtures::TestKeypair;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JWKS_PATH: &str = "/.well-known/jwks";

/// Mock key endpoint.
pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start a server with nothing mounted (every request gets 404).
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Full URL of the key endpoint.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Serve exactly `keys`, replacing whatever was served before.
    pub async fn serve_keys(&self, keys: &[&TestKeypair]) {
        self.serve_json(jwks_document(keys)).await;
    }

    /// Serve `keys` after `delay`, for timeout tests.
    pub async fn serve_keys_delayed(&self, keys: &[&TestKeypair], delay: Duration) {
        self.mount(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(keys))
                .set_delay(delay),
        )
        .await;
    }

    /// Serve an arbitrary JSON body with status 200.
    pub async fn serve_json(&self, body: serde_json::Value) {
        self.mount(ResponseTemplate::new(200).set_body_json(body))
            .await;
    }

    /// Answer every fetch with `status`.
    pub async fn fail_with(&self, status: u16) {
        self.mount(ResponseTemplate::new(status)).await;
    }

    /// Number of requests the endpoint has received.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    async fn mount(&self, response: ResponseTemplate) {
        // reset() also clears the request journal; fetch counts restart here.
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}

fn jwks_document(keys: &[&TestKeypair]) -> serde_json::Value {
    serde_json::json!({
        "keys": keys.iter().map(|key| key.jwk_json()).collect::<Vec<_>>()
    })
}
