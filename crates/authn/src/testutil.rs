//! Shared test utilities for authentication testing.
//!
//! This module provides fixed RSA and EC key pairs, helpers for signing
//! tokens with them, crafting raw JWT strings (for attack testing), and
//! building registries. It is feature-gated behind `testutil` to prevent
//! leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! authgate-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use authgate_authn::testutil::{create_signed_token, rsa_private_key_a, test_registry};
//! ```

#![allow(clippy::expect_used)]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::json;

use crate::{
    config::ServiceDefinition,
    keys::PublicKey,
    registry::{Service, ServiceRegistry},
};

/// RSA key pair "A", PKCS#1 private key.
pub const RSA_PRIVATE_KEY_A: &str = include_str!("../testdata/rsa_a_private.pem");
/// RSA key pair "A", SPKI public key.
pub const RSA_PUBLIC_KEY_A: &str = include_str!("../testdata/rsa_a_public.pem");
/// RSA key pair "A", PKCS#1 public key.
pub const RSA_PKCS1_PUBLIC_KEY_A: &str = include_str!("../testdata/rsa_a_public_pkcs1.pem");
/// RSA key pair "B", PKCS#1 private key.
pub const RSA_PRIVATE_KEY_B: &str = include_str!("../testdata/rsa_b_private.pem");
/// RSA key pair "B", SPKI public key.
pub const RSA_PUBLIC_KEY_B: &str = include_str!("../testdata/rsa_b_public.pem");
/// RSA private key whose public half is never registered anywhere.
pub const RSA_ROGUE_PRIVATE_KEY: &str = include_str!("../testdata/rsa_rogue_private.pem");
/// P-256 key pair "A", PKCS#8 private key.
pub const EC_PRIVATE_KEY_A: &str = include_str!("../testdata/ec_a_private.pem");
/// P-256 key pair "A", SPKI public key.
pub const EC_PUBLIC_KEY_A: &str = include_str!("../testdata/ec_a_public.pem");
/// P-256 key pair "B", PKCS#8 private key.
pub const EC_PRIVATE_KEY_B: &str = include_str!("../testdata/ec_b_private.pem");
/// P-256 key pair "B", SPKI public key.
pub const EC_PUBLIC_KEY_B: &str = include_str!("../testdata/ec_b_public.pem");
/// P-384 key pair, PKCS#8 private key.
pub const EC_P384_PRIVATE_KEY: &str = include_str!("../testdata/ec_p384_private.pem");
/// P-384 key pair, SPKI public key.
pub const EC_P384_PUBLIC_KEY: &str = include_str!("../testdata/ec_p384_public.pem");

/// A private key together with the algorithm tokens are signed with.
#[derive(Clone)]
pub struct TestSigningKey {
    /// Encoding key for `jsonwebtoken::encode`.
    pub encoding_key: EncodingKey,
    /// Algorithm written into the token header.
    pub algorithm: Algorithm,
}

impl TestSigningKey {
    /// Returns the same key signing with a different algorithm of its family.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

fn rsa_key(pem: &str) -> TestSigningKey {
    TestSigningKey {
        encoding_key: EncodingKey::from_rsa_pem(pem.as_bytes()).expect("test RSA key"),
        algorithm: Algorithm::RS256,
    }
}

fn ec_key(pem: &str) -> TestSigningKey {
    TestSigningKey {
        encoding_key: EncodingKey::from_ec_pem(pem.as_bytes()).expect("test EC key"),
        algorithm: Algorithm::ES256,
    }
}

/// Signing half of [`RSA_PUBLIC_KEY_A`], RS256.
pub fn rsa_private_key_a() -> TestSigningKey {
    rsa_key(RSA_PRIVATE_KEY_A)
}

/// Signing half of [`RSA_PUBLIC_KEY_B`], RS256.
pub fn rsa_private_key_b() -> TestSigningKey {
    rsa_key(RSA_PRIVATE_KEY_B)
}

/// An RSA key no registered service trusts, RS256.
pub fn rsa_rogue_key() -> TestSigningKey {
    rsa_key(RSA_ROGUE_PRIVATE_KEY)
}

/// Signing half of [`EC_PUBLIC_KEY_A`], ES256.
pub fn ec_private_key_a() -> TestSigningKey {
    ec_key(EC_PRIVATE_KEY_A)
}

/// Signing half of [`EC_PUBLIC_KEY_B`], ES256.
pub fn ec_private_key_b() -> TestSigningKey {
    ec_key(EC_PRIVATE_KEY_B)
}

/// Creates a signed token for `subject`.
///
/// `iat` and `exp` are set relative to the current time, so
/// `create_signed_token(&key, "svc-a", 0, 3600)` is a fresh token valid for
/// one hour and `create_signed_token(&key, "svc-a", -7200, -60)` is an
/// expired one.
///
/// # Panics
///
/// Panics if JWT encoding fails (should not happen with valid inputs).
pub fn create_signed_token(
    key: &TestSigningKey,
    subject: &str,
    iat_offset_secs: i64,
    exp_offset_secs: i64,
) -> String {
    let now = Utc::now().timestamp();
    create_token_with_claims(
        key,
        &json!({
            "sub": subject,
            "iat": now + iat_offset_secs,
            "exp": now + exp_offset_secs,
        }),
    )
}

/// Creates a token signed with `key` carrying exactly `claims`.
///
/// Useful for tokens missing `iat` or `exp`, or carrying odd claim types.
///
/// # Panics
///
/// Panics if JWT encoding fails.
pub fn create_token_with_claims(key: &TestSigningKey, claims: &serde_json::Value) -> String {
    let header = Header::new(key.algorithm);
    jsonwebtoken::encode(&header, claims, &key.encoding_key).expect("Failed to encode test JWT")
}

/// Creates a raw JWT string from arbitrary header and payload JSON.
///
/// The resulting JWT has the structure `{header_b64}.{payload_b64}.`
/// with an empty signature. This is useful for testing rejection of
/// malformed or attack JWTs (e.g., `alg: "none"`, algorithm confusion).
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn craft_raw_token(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// Builds a [`ServiceDefinition`] from string slices.
pub fn service_definition(id: &str, paths: &[&str], public_keys: &[&str]) -> ServiceDefinition {
    ServiceDefinition {
        id: id.to_owned(),
        paths: paths.iter().map(|p| (*p).to_owned()).collect(),
        public_keys: public_keys.iter().map(|k| (*k).to_owned()).collect(),
    }
}

/// Builds a [`Service`] trusting [`RSA_PUBLIC_KEY_A`].
///
/// # Panics
///
/// Panics if the embedded test key fails to parse.
pub fn test_service(id: &str, paths: &[&str]) -> Service {
    let key = PublicKey::from_pem(RSA_PUBLIC_KEY_A.as_bytes()).expect("test public key");
    Service::new(id, paths.iter().copied(), vec![key])
}

/// Builds the registry used across the test suites:
///
/// | id      | paths                  | keys                                   |
/// |---------|------------------------|----------------------------------------|
/// | `svc-a` | `/api/`                | [`RSA_PUBLIC_KEY_A`], [`EC_PUBLIC_KEY_A`] |
/// | `svc-b` | `/status/`, `/health/` | [`RSA_PUBLIC_KEY_B`]                   |
///
/// # Panics
///
/// Panics if the registry fails to load.
pub fn test_registry() -> ServiceRegistry {
    ServiceRegistry::load(&[
        service_definition("svc-a", &["/api/"], &[RSA_PUBLIC_KEY_A, EC_PUBLIC_KEY_A]),
        service_definition("svc-b", &["status", "/health"], &[RSA_PUBLIC_KEY_B]),
    ])
    .expect("test registry")
}

/// Asserts that a [`Result<T, AuthError>`] is an `Err` matching the given [`AuthError`] variant.
///
/// Works with any `AuthError` variant. On failure, prints the expected variant
/// and the actual result for debugging.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use authgate_authn::assert_auth_error;
/// use authgate_authn::error::AuthError;
///
/// let result: Result<(), AuthError> = Err(AuthError::token_expired());
/// assert_auth_error!(result, TokenExpired);
/// ```
///
/// [`AuthError`]: crate::error::AuthError
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}
