//! GitHub Actions identity claims.
//!
//! A verified token is represented as `ActionsClaims`: the registered JWT
//! claims plus the CI-specific identity attributes, kept as two nested values
//! and flattened on the wire. Fields are private so that a claim set handed
//! out by the verifier cannot be altered afterwards.

use serde::{Deserialize, Deserializer, Serialize};

/// Registered (standard) JWT claims. All of them are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    /// Issuer.
    pub iss: String,

    /// Subject, e.g. `repo:acme/widgets:ref:refs/heads/main`.
    pub sub: String,

    /// Audiences. Accepts a single string or an array on the wire.
    #[serde(deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Not-before timestamp (Unix epoch seconds).
    pub nbf: i64,
}

/// CI identity attributes asserted by GitHub Actions.
///
/// Every field is optional in the token and defaults to the empty string.
/// The same shape doubles as the template behind
/// [`RequiredPattern`](crate::auth::policy::RequiredPattern).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityClaims {
    pub environment: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
    pub repository: String,
    pub repository_owner: String,
    pub actor: String,
    pub actor_id: String,
    pub repository_visibility: String,
    pub repository_id: String,
    pub repository_owner_id: String,
    pub run_id: String,
    pub run_number: String,
    pub run_attempt: String,
    pub runner_environment: String,
    pub workflow: String,
    pub head_ref: String,
    pub base_ref: String,
    pub event_name: String,
    pub ref_type: String,
    pub job_workflow_ref: String,
}

/// Claims of a verified GitHub Actions token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionsClaims {
    #[serde(flatten)]
    registered: RegisteredClaims,

    #[serde(flatten)]
    identity: IdentityClaims,
}

impl ActionsClaims {
    #[cfg(test)]
    pub(crate) fn from_parts(registered: RegisteredClaims, identity: IdentityClaims) -> Self {
        Self {
            registered,
            identity,
        }
    }

    pub fn registered(&self) -> &RegisteredClaims {
        &self.registered
    }

    pub fn identity(&self) -> &IdentityClaims {
        &self.identity
    }

    pub fn issuer(&self) -> &str {
        &self.registered.iss
    }

    pub fn subject(&self) -> &str {
        &self.registered.sub
    }

    pub fn audience(&self) -> &[String] {
        &self.registered.aud
    }

    /// Whether `audience` is one of the token's audiences.
    pub fn has_audience(&self, audience: &str) -> bool {
        self.registered.aud.iter().any(|aud| aud == audience)
    }

    pub fn issued_at(&self) -> i64 {
        self.registered.iat
    }

    pub fn expires_at(&self) -> i64 {
        self.registered.exp
    }

    pub fn not_before(&self) -> i64 {
        self.registered.nbf
    }

    pub fn repository(&self) -> &str {
        &self.identity.repository
    }

    pub fn repository_owner(&self) -> &str {
        &self.identity.repository_owner
    }

    pub fn environment(&self) -> &str {
        &self.identity.environment
    }

    pub fn git_ref(&self) -> &str {
        &self.identity.git_ref
    }

    pub fn sha(&self) -> &str {
        &self.identity.sha
    }

    pub fn actor(&self) -> &str {
        &self.identity.actor
    }

    pub fn workflow(&self) -> &str {
        &self.identity.workflow
    }

    pub fn job_workflow_ref(&self) -> &str {
        &self.identity.job_workflow_ref
    }

    pub fn run_id(&self) -> &str {
        &self.identity.run_id
    }
}

fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(auds) => auds,
    })
}
