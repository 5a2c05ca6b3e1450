//! Token verification.
//!
//! Turns a raw credential into verified `ActionsClaims` or a precise
//! `VerificationError`.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The signing algorithm must fit the resolved key's type; HMAC is never accepted
//! - The signature is verified before any claim is read
//! - `exp` and `nbf` are always enforced, with the configured clock skew

use crate::auth::claims::ActionsClaims;
use crate::auth::jwks::{Jwk, KeyResolver};
use crate::config::VerificationOptions;
use crate::errors::VerificationError;
use crate::observability::metrics::record_verification;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Header, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Maximum allowed JWT size in bytes (8KB).
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

const BEARER_PREFIX: &str = "Bearer ";

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Verifies GitHub Actions OIDC tokens.
///
/// Holds no mutable state of its own; share it behind an `Arc`.
pub struct TokenVerifier {
    resolver: Arc<dyn KeyResolver>,

    /// Audience the token must carry. Empty disables the check.
    expected_audience: String,

    clock_skew: Duration,
}

impl TokenVerifier {
    /// Create a verifier backed by `resolver`.
    ///
    /// Only the audience and clock skew are taken from `options`; the key
    /// endpoints belong to the resolver.
    pub fn new(resolver: Arc<dyn KeyResolver>, options: &VerificationOptions) -> Self {
        Self {
            resolver,
            expected_audience: options.expected_audience.clone(),
            clock_skew: options.clock_skew(),
        }
    }

    /// Verify `credential` against the current wall-clock time.
    ///
    /// `credential` may carry a single `"Bearer "` prefix.
    ///
    /// # Errors
    ///
    /// Returns the `VerificationError` for the first check that failed:
    /// credential presence, token structure, key resolution, signature,
    /// expiry, not-before, then audience.
    pub async fn verify(&self, credential: &str) -> Result<ActionsClaims, VerificationError> {
        self.verify_at(credential, chrono::Utc::now().timestamp())
            .await
    }

    /// Verify `credential` as of `now` (Unix epoch seconds).
    #[instrument(skip_all)]
    pub async fn verify_at(
        &self,
        credential: &str,
        now: i64,
    ) -> Result<ActionsClaims, VerificationError> {
        let result = self.verify_inner(credential, now).await;

        match &result {
            Ok(claims) => {
                tracing::debug!(
                    target: "oidc.auth.jwt",
                    repository = %claims.repository(),
                    subject = %claims.subject(),
                    "Token verified"
                );
                record_verification("accepted");
            }
            Err(e) => {
                tracing::debug!(target: "oidc.auth.jwt", kind = e.kind(), error = %e, "Token rejected");
                record_verification(e.kind());
            }
        }

        result
    }

    async fn verify_inner(
        &self,
        credential: &str,
        now: i64,
    ) -> Result<ActionsClaims, VerificationError> {
        let token = strip_bearer(credential)?;

        let header = decode_unverified_header(token)?;
        let kid = header
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| VerificationError::MalformedToken("header has no kid".to_string()))?;

        let jwk = self
            .resolver
            .resolve(kid)
            .await
            .map_err(|e| VerificationError::UnknownKey(e.to_string()))?;

        let claims = verify_signature(token, &header, &jwk)?;

        let skew = i64::try_from(self.clock_skew.as_secs()).unwrap_or(i64::MAX);

        if claims.expires_at() <= now.saturating_sub(skew) {
            return Err(VerificationError::Expired);
        }
        if claims.not_before() > now.saturating_add(skew) {
            return Err(VerificationError::NotYetValid);
        }
        if !self.expected_audience.is_empty() && !claims.has_audience(&self.expected_audience) {
            return Err(VerificationError::AudienceMismatch);
        }

        Ok(claims)
    }
}

/// Remove one case-sensitive `"Bearer "` prefix, rejecting empty credentials.
pub fn strip_bearer(credential: &str) -> Result<&str, VerificationError> {
    let token = credential.strip_prefix(BEARER_PREFIX).unwrap_or(credential);
    if token.is_empty() {
        return Err(VerificationError::MissingCredential);
    }
    Ok(token)
}

/// Decode the token header without verifying anything.
///
/// The size limit is enforced before any decoding happens.
pub fn decode_unverified_header(token: &str) -> Result<Header, VerificationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "oidc.auth.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(VerificationError::MalformedToken(format!(
            "token exceeds {} bytes",
            MAX_JWT_SIZE_BYTES
        )));
    }

    decode_header(token).map_err(|e| VerificationError::MalformedToken(e.to_string()))
}

/// Algorithms a key of this type may verify.
fn allowed_algorithms(jwk: &Jwk) -> Result<&'static [Algorithm], VerificationError> {
    match (jwk.kty.as_str(), jwk.crv.as_deref()) {
        ("RSA", _) => Ok(RSA_ALGORITHMS),
        ("EC", Some("P-256")) => Ok(&[Algorithm::ES256]),
        ("EC", Some("P-384")) => Ok(&[Algorithm::ES384]),
        ("OKP", Some("Ed25519")) => Ok(&[Algorithm::EdDSA]),
        (kty, crv) => Err(VerificationError::UnknownKey(format!(
            "unsupported key type {} (curve {})",
            kty,
            crv.unwrap_or("none")
        ))),
    }
}

/// Reject any header algorithm the key was not made for.
fn check_algorithm(header_alg: Algorithm, jwk: &Jwk) -> Result<(), VerificationError> {
    if !allowed_algorithms(jwk)?.contains(&header_alg) {
        tracing::warn!(
            target: "oidc.auth.jwt",
            alg = ?header_alg,
            kty = %jwk.kty,
            "Token algorithm not allowed for key type"
        );
        return Err(VerificationError::BadSignature(format!(
            "algorithm {:?} not allowed for {} key",
            header_alg, jwk.kty
        )));
    }

    if let Some(declared) = jwk.alg.as_deref() {
        let declared: Algorithm = declared.parse().map_err(|_| {
            VerificationError::UnknownKey(format!("key declares unsupported algorithm {}", declared))
        })?;
        if declared != header_alg {
            return Err(VerificationError::BadSignature(format!(
                "algorithm {:?} does not match key algorithm {:?}",
                header_alg, declared
            )));
        }
    }

    Ok(())
}

fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, VerificationError> {
    let missing =
        |field: &str| VerificationError::UnknownKey(format!("{} key missing {}", jwk.kty, field));

    let key = match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_deref().ok_or_else(|| missing("n"))?;
            let e = jwk.e.as_deref().ok_or_else(|| missing("e"))?;
            DecodingKey::from_rsa_components(n, e)
        }
        "EC" => {
            let x = jwk.x.as_deref().ok_or_else(|| missing("x"))?;
            let y = jwk.y.as_deref().ok_or_else(|| missing("y"))?;
            DecodingKey::from_ec_components(x, y)
        }
        _ => {
            let x = jwk.x.as_deref().ok_or_else(|| missing("x"))?;
            DecodingKey::from_ed_components(x)
        }
    };

    key.map_err(|e| VerificationError::UnknownKey(format!("unusable key material: {}", e)))
}

/// Verify the signature and decode the claims.
///
/// Time and audience checks are left to the caller so that `now` can be injected.
fn verify_signature(
    token: &str,
    header: &Header,
    jwk: &Jwk,
) -> Result<ActionsClaims, VerificationError> {
    check_algorithm(header.alg, jwk)?;
    let key = decoding_key(jwk)?;

    let mut validation = Validation::new(header.alg);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let token_data = decode::<ActionsClaims>(token, &key, &validation).map_err(|e| {
        let detail = e.to_string();
        match e.into_kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::Crypto(_) => VerificationError::BadSignature(detail),
            _ => VerificationError::MalformedToken(detail),
        }
    })?;

    Ok(token_data.claims)
}
