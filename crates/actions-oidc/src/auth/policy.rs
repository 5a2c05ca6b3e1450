//! Partial-match authorization against a required claim pattern.
//!
//! A `RequiredPattern` lists the identity claims a token must carry. Every
//! non-empty field must equal the observed value byte for byte; empty fields
//! are wildcards. Matching walks a single table of identity fields, so a new
//! claim only needs a new table row.

use crate::auth::claims::{ActionsClaims, IdentityClaims};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use thiserror::Error;

/// A field name that is not one of the known identity claims.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown identity claim: {0}")]
pub struct UnknownClaimField(pub String);

struct IdentityField {
    name: &'static str,
    get: fn(&IdentityClaims) -> &str,
    get_mut: fn(&mut IdentityClaims) -> &mut String,
}

macro_rules! identity_field {
    ($name:literal, $field:ident) => {
        IdentityField {
            name: $name,
            get: |claims| claims.$field.as_str(),
            get_mut: |claims| &mut claims.$field,
        }
    };
}

static IDENTITY_FIELDS: [IdentityField; 20] = [
    identity_field!("environment", environment),
    identity_field!("ref", git_ref),
    identity_field!("sha", sha),
    identity_field!("repository", repository),
    identity_field!("repository_owner", repository_owner),
    identity_field!("actor", actor),
    identity_field!("actor_id", actor_id),
    identity_field!("repository_visibility", repository_visibility),
    identity_field!("repository_id", repository_id),
    identity_field!("repository_owner_id", repository_owner_id),
    identity_field!("run_id", run_id),
    identity_field!("run_number", run_number),
    identity_field!("run_attempt", run_attempt),
    identity_field!("runner_environment", runner_environment),
    identity_field!("workflow", workflow),
    identity_field!("head_ref", head_ref),
    identity_field!("base_ref", base_ref),
    identity_field!("event_name", event_name),
    identity_field!("ref_type", ref_type),
    identity_field!("job_workflow_ref", job_workflow_ref),
];

/// Identity claims a token must carry to be authorized.
///
/// # Example
///
/// ```rust
/// use actions_oidc::auth::RequiredPattern;
///
/// let required = RequiredPattern::new()
///     .repository_owner("acme")
///     .environment("prod");
/// assert!(!required.is_unconstrained());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredPattern(IdentityClaims);

impl RequiredPattern {
    /// A pattern that accepts any identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain the claim named `field` (wire name, e.g. `"repository_owner"`).
    pub fn with_claim(
        mut self,
        field: &str,
        value: impl Into<String>,
    ) -> Result<Self, UnknownClaimField> {
        let entry = IDENTITY_FIELDS
            .iter()
            .find(|entry| entry.name == field)
            .ok_or_else(|| UnknownClaimField(field.to_string()))?;
        *(entry.get_mut)(&mut self.0) = value.into();
        Ok(self)
    }

    pub fn repository(mut self, value: impl Into<String>) -> Self {
        self.0.repository = value.into();
        self
    }

    pub fn repository_owner(mut self, value: impl Into<String>) -> Self {
        self.0.repository_owner = value.into();
        self
    }

    pub fn environment(mut self, value: impl Into<String>) -> Self {
        self.0.environment = value.into();
        self
    }

    pub fn git_ref(mut self, value: impl Into<String>) -> Self {
        self.0.git_ref = value.into();
        self
    }

    pub fn workflow(mut self, value: impl Into<String>) -> Self {
        self.0.workflow = value.into();
        self
    }

    pub fn job_workflow_ref(mut self, value: impl Into<String>) -> Self {
        self.0.job_workflow_ref = value.into();
        self
    }

    pub fn identity(&self) -> &IdentityClaims {
        &self.0
    }

    /// True when no field is constrained.
    pub fn is_unconstrained(&self) -> bool {
        self.constrained_fields().next().is_none()
    }

    /// Constrained fields as `(claim name, required value)`, in table order.
    pub fn constrained_fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        IDENTITY_FIELDS.iter().filter_map(move |entry| {
            let value = (entry.get)(&self.0);
            (!value.is_empty()).then_some((entry.name, value))
        })
    }
}

impl From<IdentityClaims> for RequiredPattern {
    fn from(identity: IdentityClaims) -> Self {
        Self(identity)
    }
}

impl<'de> Deserialize<'de> for RequiredPattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // A misspelled claim would otherwise turn into a silent wildcard.
        let fields = BTreeMap::<String, String>::deserialize(deserializer)?;
        fields
            .into_iter()
            .try_fold(RequiredPattern::new(), |pattern, (name, value)| {
                pattern.with_claim(&name, value)
            })
            .map_err(D::Error::custom)
    }
}

/// Name of the first constrained field whose observed value differs.
pub fn first_mismatch(observed: &ActionsClaims, required: &RequiredPattern) -> Option<&'static str> {
    let observed = observed.identity();
    IDENTITY_FIELDS.iter().find_map(|entry| {
        let wanted = (entry.get)(&required.0);
        (!wanted.is_empty() && wanted != (entry.get)(observed)).then_some(entry.name)
    })
}

/// Whether `observed` satisfies every constrained field of `required`.
pub fn matches(observed: &ActionsClaims, required: &RequiredPattern) -> bool {
    first_mismatch(observed, required).is_none()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::claims::RegisteredClaims;

    fn observed(identity: IdentityClaims) -> ActionsClaims {
        ActionsClaims::from_parts(
            RegisteredClaims {
                iss: "https://token.actions.githubusercontent.com".to_string(),
                sub: "repo:acme/widgets:ref:refs/heads/main".to_string(),
                aud: vec!["my-aud".to_string()],
                iat: 1_700_000_000,
                exp: 1_700_000_300,
                nbf: 1_700_000_000,
            },
            identity,
        )
    }

    fn acme_widgets() -> ActionsClaims {
        observed(IdentityClaims {
            repository_owner: "acme".to_string(),
            repository: "acme/widgets".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_table_covers_every_identity_field() {
        let names: Vec<&str> = IDENTITY_FIELDS.iter().map(|entry| entry.name).collect();
        let serialized = serde_json::to_value(IdentityClaims::default()).unwrap();
        let object = serialized.as_object().unwrap();

        assert_eq!(names.len(), object.len());
        for name in names {
            assert!(object.contains_key(name), "missing table row for {}", name);
        }
    }

    #[test]
    fn test_table_getters_and_setters_agree() {
        for entry in &IDENTITY_FIELDS {
            let pattern = RequiredPattern::new().with_claim(entry.name, "value").unwrap();
            assert_eq!((entry.get)(pattern.identity()), "value", "{}", entry.name);
            assert_eq!(pattern.constrained_fields().count(), 1, "{}", entry.name);
        }
    }

    #[test]
    fn test_empty_pattern_matches_anything() {
        assert!(matches(&acme_widgets(), &RequiredPattern::new()));
        assert!(matches(&observed(IdentityClaims::default()), &RequiredPattern::new()));
    }

    #[test]
    fn test_owner_only_pattern_matches() {
        let required = RequiredPattern::new().repository_owner("acme");
        assert!(matches(&acme_widgets(), &required));
    }

    #[test]
    fn test_unset_observed_environment_fails_constrained_pattern() {
        let required = RequiredPattern::new()
            .repository_owner("acme")
            .environment("prod");

        assert!(!matches(&acme_widgets(), &required));
        assert_eq!(first_mismatch(&acme_widgets(), &required), Some("environment"));
    }

    #[test]
    fn test_every_field_constrains_independently() {
        for entry in &IDENTITY_FIELDS {
            let required = RequiredPattern::new().with_claim(entry.name, "expected").unwrap();

            let mut identity = IdentityClaims::default();
            *(entry.get_mut)(&mut identity) = "expected".to_string();
            assert!(matches(&observed(identity.clone()), &required), "{}", entry.name);

            *(entry.get_mut)(&mut identity) = "other".to_string();
            assert!(!matches(&observed(identity), &required), "{}", entry.name);
        }
    }

    #[test]
    fn test_no_prefix_or_case_folding() {
        let claims = acme_widgets();

        assert!(!matches(&claims, &RequiredPattern::new().repository_owner("acm")));
        assert!(!matches(&claims, &RequiredPattern::new().repository_owner("ACME")));
        assert!(!matches(&claims, &RequiredPattern::new().repository("acme/*")));
    }

    #[test]
    fn test_with_claim_rejects_unknown_field() {
        let result = RequiredPattern::new().with_claim("repo_owner", "acme");
        assert_eq!(result, Err(UnknownClaimField("repo_owner".to_string())));
    }

    #[test]
    fn test_deserialize_pattern() {
        let required: RequiredPattern =
            serde_json::from_str(r#"{"repository_owner":"acme","ref":"refs/heads/main"}"#).unwrap();

        assert_eq!(required.identity().repository_owner, "acme");
        assert_eq!(required.identity().git_ref, "refs/heads/main");
        assert_eq!(required.constrained_fields().count(), 2);
    }

    #[test]
    fn test_deserialize_pattern_rejects_unknown_field() {
        let result = serde_json::from_str::<RequiredPattern>(r#"{"owner":"acme"}"#);
        assert!(result.unwrap_err().to_string().contains("owner"));
    }

    #[test]
    fn test_matches_is_pure() {
        let claims = acme_widgets();
        let required = RequiredPattern::new().repository("acme/widgets");

        let first = matches(&claims, &required);
        let second = matches(&claims, &required);

        assert!(first);
        assert_eq!(first, second);
        assert_eq!(claims, acme_widgets());
    }
}
