//! Metric definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `oidc_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded by code:
//! - `outcome`: "accepted" or a `VerificationError::kind()` label (8 values)
//! - `status`: 2 values (success, error)
//! - `decision`: 2 values (allowed, denied)

use metrics::counter;

/// Record the outcome of a token verification.
///
/// Metric: `oidc_token_verifications_total`
/// Labels: `outcome`
pub fn record_verification(outcome: &'static str) {
    counter!("oidc_token_verifications_total", "outcome" => outcome).increment(1);
}

/// Record a key refresh attempt.
///
/// Metric: `oidc_jwks_refresh_total`
/// Labels: `status`
pub fn record_jwks_refresh(status: &'static str) {
    counter!("oidc_jwks_refresh_total", "status" => status).increment(1);
}

/// Record a required-claims decision.
///
/// Metric: `oidc_policy_decisions_total`
/// Labels: `decision`
pub fn record_policy_decision(allowed: bool) {
    let decision = if allowed { "allowed" } else { "denied" };
    counter!("oidc_policy_decisions_total", "decision" => decision).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

    fn counter_value(snapshotter: &Snapshotter, name: &str, label: (&str, &str)) -> Option<u64> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| {
                let key = key.key();
                let labelled = key
                    .labels()
                    .any(|l| l.key() == label.0 && l.value() == label.1);
                match value {
                    DebugValue::Counter(count) if key.name() == name && labelled => Some(count),
                    _ => None,
                }
            })
    }

    #[test]
    fn test_record_verification() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_verification("accepted");
            record_verification("accepted");
            record_verification("expired");
        });

        assert_eq!(
            counter_value(&snapshotter, "oidc_token_verifications_total", ("outcome", "accepted")),
            Some(2)
        );
        assert_eq!(
            counter_value(&snapshotter, "oidc_token_verifications_total", ("outcome", "expired")),
            Some(1)
        );
    }

    #[test]
    fn test_record_jwks_refresh() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_jwks_refresh("success");
            record_jwks_refresh("error");
        });

        assert_eq!(
            counter_value(&snapshotter, "oidc_jwks_refresh_total", ("status", "success")),
            Some(1)
        );
        assert_eq!(
            counter_value(&snapshotter, "oidc_jwks_refresh_total", ("status", "error")),
            Some(1)
        );
    }

    #[test]
    fn test_record_policy_decision() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_policy_decision(true);
            record_policy_decision(false);
            record_policy_decision(false);
        });

        assert_eq!(
            counter_value(&snapshotter, "oidc_policy_decisions_total", ("decision", "denied")),
            Some(2)
        );
    }
}
