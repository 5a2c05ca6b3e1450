//! Builder patterns for test claim construction
//!
//! Produces GitHub Actions shaped claim sets as JSON, ready for signing.

use chrono::Utc;
use serde_json::{json, Map, Value};

/// Issuer used by GitHub Actions.
pub const GITHUB_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// Builder for GitHub Actions token claims.
///
/// Defaults describe a push to `acme/widgets` on `refs/heads/main`, valid for
/// five minutes from now, with audience `my-aud`.
///
/// # Example
/// ```rust,ignore
/// let claims = TestClaimsBuilder::new()
///     .audience("sts.example.com")
///     .claim("environment", "prod")
///     .expires_in(60)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestClaimsBuilder {
    claims: Map<String, Value>,
}

impl TestClaimsBuilder {
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        let defaults = json!({
            "iss": GITHUB_ISSUER,
            "sub": "repo:acme/widgets:ref:refs/heads/main",
            "aud": "my-aud",
            "iat": now,
            "nbf": now,
            "exp": now + 300,
            "jti": "test-jti",
            "repository": "acme/widgets",
            "repository_owner": "acme",
            "repository_owner_id": "1001",
            "repository_id": "2002",
            "repository_visibility": "private",
            "ref": "refs/heads/main",
            "ref_type": "branch",
            "sha": "d6e0b8a1c2f3",
            "actor": "octocat",
            "actor_id": "3003",
            "workflow": "deploy",
            "event_name": "push",
            "run_id": "4004",
            "run_number": "7",
            "run_attempt": "1",
            "runner_environment": "github-hosted",
            "job_workflow_ref": "acme/widgets/.github/workflows/deploy.yml@refs/heads/main"
        });

        let claims = match defaults {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { claims }
    }

    /// Set a single audience string.
    pub fn audience(self, audience: &str) -> Self {
        self.claim_value("aud", json!(audience))
    }

    /// Set an audience array.
    pub fn audiences(self, audiences: &[&str]) -> Self {
        self.claim_value("aud", json!(audiences))
    }

    /// Set expiration in seconds from now.
    pub fn expires_in(self, seconds: i64) -> Self {
        self.expires_at(Utc::now().timestamp() + seconds)
    }

    pub fn expires_at(self, timestamp: i64) -> Self {
        self.claim_value("exp", json!(timestamp))
    }

    pub fn not_before(self, timestamp: i64) -> Self {
        self.claim_value("nbf", json!(timestamp))
    }

    pub fn issued_at(self, timestamp: i64) -> Self {
        self.claim_value("iat", json!(timestamp))
    }

    /// Set any string claim (wire name, e.g. `"ref"`).
    pub fn claim(self, name: &str, value: &str) -> Self {
        self.claim_value(name, json!(value))
    }

    pub fn claim_value(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim entirely.
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}

impl Default for TestClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
