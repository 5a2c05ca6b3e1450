//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs that sign tokens and publish
//! themselves as JWKs. The same seed always yields the same key.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};

/// Ed25519 test keypair with a key ID.
#[derive(Debug, Clone)]
pub struct TestKeypair {
    kid: String,
    public_key_bytes: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestKeypair {
    /// Create a deterministic keypair from `seed`.
    pub fn new(seed: u8, kid: &str) -> Self {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        // Fill rest with deterministic pattern
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("Failed to create test keypair");

        Self {
            kid: kid.to_string(),
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Sign `claims` as an EdDSA JWT carrying this key's `kid`.
    pub fn sign(&self, claims: &serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());
        self.sign_with_header(&header, claims)
    }

    /// Sign with a caller-supplied header (e.g. a different or missing `kid`).
    ///
    /// The header's `alg` must be EdDSA.
    pub fn sign_with_header(&self, header: &Header, claims: &serde_json::Value) -> String {
        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        encode(header, claims, &encoding_key).expect("Failed to sign token")
    }

    /// JWK for this key, as served by a JWKS endpoint.
    pub fn jwk_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key_bytes),
            "alg": "EdDSA",
            "use": "sig"
        })
    }
}

/// HS256 token carrying `kid`, signed with `secret`.
///
/// Used to check that symmetric algorithms are refused regardless of the key.
pub fn sign_hs256(kid: &str, secret: &[u8], claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(secret)).expect("Failed to sign token")
}

/// Build PKCS#8 v1 document from Ed25519 seed.
///
/// Ring doesn't expose PKCS#8 for a seeded keypair, so it is assembled here.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::with_capacity(48);

    // SEQUENCE, 46 bytes
    pkcs8.extend_from_slice(&[0x30, 0x2e]);
    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);
    // AlgorithmIdentifier: SEQUENCE { OID 1.3.101.112 }
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    // PrivateKey: OCTET STRING { OCTET STRING (32-byte seed) }
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);

    pkcs8
}
