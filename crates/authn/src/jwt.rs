//! Bearer token parsing and verification.
//!
//! Verification happens in two phases with different trust levels:
//!
//! 1. [`extract_subject_unchecked`] decodes the token without looking at the
//!    signature. Its only job is to find out which service the token claims
//!    to belong to. Nothing it returns may be trusted.
//! 2. [`verify_and_extract_claims`] checks the signature against one specific
//!    key and then enforces the `exp`, `iat` and `nbf` time bounds.
//!
//! [`TokenVerifier`] ties the two together: it resolves the subject in the
//! [`ServiceRegistry`] and tries the service's keys in registration order.
//!
//! Both phases apply the same algorithm allow-list (see
//! [`crate::validation`]), so an `HS256` or `none` token is rejected before
//! any registry lookup.

use std::{sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::AuthError,
    keys::PublicKey,
    registry::{Service, ServiceRegistry},
    validation::validate_algorithm,
};

/// Registered claims read from a token payload.
///
/// Unknown claims are ignored. A missing `sub` decodes as an empty string so
/// it can be reported as [`AuthError::NoSubject`] rather than a decode
/// failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the id of the service this token was issued for.
    #[serde(default)]
    pub sub: String,
    /// Issued at (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiration time (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Not before (seconds since epoch), checked only when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Issuer, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// A token split into its three segments with the header already checked.
struct TokenParts<'a> {
    algorithm: Algorithm,
    signing_input: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> TokenParts<'a> {
    fn parse(token: &'a str) -> Result<Self, AuthError> {
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| AuthError::malformed_token("JWT must have 3 parts separated by dots"))?;
        let (header, payload) = signing_input
            .split_once('.')
            .ok_or_else(|| AuthError::malformed_token("JWT must have 3 parts separated by dots"))?;
        if payload.contains('.') {
            return Err(AuthError::malformed_token("JWT must have 3 parts separated by dots"));
        }

        let header: RawHeader = decode_segment(header, "header")?;
        let algorithm = validate_algorithm(&header.alg)?;

        Ok(Self { algorithm, signing_input, payload, signature })
    }

    fn claims(&self) -> Result<TokenClaims, AuthError> {
        decode_segment(self.payload, "claims")
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str, what: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        AuthError::malformed_token(format!("Failed to decode JWT {what}: {e}"))
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::malformed_token(format!("Failed to parse JWT {what}: {e}")))
}

/// Reads the `sub` claim without verifying the signature.
///
/// The header `alg` must still be on the asymmetric allow-list. The returned
/// subject is untrusted and only good for choosing which keys to verify with.
///
/// # Errors
///
/// - [`AuthError::MalformedToken`] if the token is not three base64url JSON
///   segments, or its algorithm is not accepted
/// - [`AuthError::NoSubject`] if `sub` is missing or empty
pub fn extract_subject_unchecked(token: &str) -> Result<String, AuthError> {
    let parts = TokenParts::parse(token)?;
    let claims = parts.claims()?;
    if claims.sub.is_empty() {
        return Err(AuthError::no_subject());
    }
    Ok(claims.sub)
}

/// Verifies `token` with `key` and enforces its time bounds.
///
/// # Errors
///
/// - [`AuthError::MalformedToken`] for a structurally invalid token or
///   disallowed algorithm
/// - [`AuthError::InvalidSignature`] if `key` did not produce the signature,
///   including when the algorithm belongs to the other key family
/// - [`AuthError::TokenExpired`] if `exp` is missing or not in the future
/// - [`AuthError::TokenTooOld`] if `iat` is missing or older than `freshness`
/// - [`AuthError::TokenNotYetValid`] if `iat` or `nbf` is in the future
pub fn verify_and_extract_claims(
    token: &str,
    key: &PublicKey,
    freshness: Duration,
) -> Result<TokenClaims, AuthError> {
    verify_with_deadline(token, key, freshness).map(|(claims, _)| claims)
}

fn verify_with_deadline(
    token: &str,
    key: &PublicKey,
    freshness: Duration,
) -> Result<(TokenClaims, i64), AuthError> {
    let parts = TokenParts::parse(token)?;
    if !key.verify_signature(parts.signing_input.as_bytes(), parts.signature, parts.algorithm) {
        return Err(AuthError::invalid_signature());
    }

    let claims = parts.claims()?;
    let valid_until = check_time_bounds(&claims, freshness, Utc::now().timestamp())?;
    Ok((claims, valid_until))
}

/// Checks `exp`, `iat` and `nbf` against `now` and returns the first second
/// at which the token stops passing these checks.
fn check_time_bounds(claims: &TokenClaims, freshness: Duration, now: i64) -> Result<i64, AuthError> {
    let exp = match claims.exp {
        Some(exp) if exp > now => exp,
        _ => return Err(AuthError::token_expired()),
    };

    let window = i64::try_from(freshness.as_secs()).unwrap_or(i64::MAX);
    let oldest = now.saturating_sub(window);
    let iat = match claims.iat {
        Some(iat) if iat > now => return Err(AuthError::token_not_yet_valid()),
        Some(iat) if iat >= oldest => iat,
        _ => return Err(AuthError::token_too_old()),
    };

    if let Some(nbf) = claims.nbf
        && nbf > now
    {
        return Err(AuthError::token_not_yet_valid());
    }

    // `iat` stays fresh through second `iat + window` inclusive.
    Ok(exp.min(iat.saturating_add(window).saturating_add(1)))
}

/// The outcome of a successful [`TokenVerifier::verify`].
#[derive(Clone, Debug)]
pub struct Verified {
    /// The service named by the token subject.
    pub service: Arc<Service>,
    /// Claims read after the signature was checked.
    pub claims: TokenClaims,
    /// Unix second from which the token fails `exp` or freshness checks.
    pub valid_until: i64,
}

/// Resolves tokens to registered services.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    registry: Arc<ServiceRegistry>,
    freshness: Duration,
}

impl TokenVerifier {
    /// Creates a verifier over `registry` accepting tokens issued within
    /// `freshness` of now.
    #[must_use]
    pub fn new(registry: Arc<ServiceRegistry>, freshness: Duration) -> Self {
        Self { registry, freshness }
    }

    /// The registry this verifier resolves subjects against.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// The configured freshness window.
    #[must_use]
    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Verifies `token` and returns the service it belongs to.
    ///
    /// Keys are tried in registration order and the first one that accepts
    /// the token wins. When every key rejects it, the error from the last key
    /// is returned.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] from [`extract_subject_unchecked`],
    /// [`ServiceRegistry::get_service`] or [`verify_and_extract_claims`].
    pub fn verify(&self, token: &str) -> Result<Verified, AuthError> {
        let subject = extract_subject_unchecked(token)?;
        let service = self.registry.get_service(&subject)?;

        let mut first_error: Option<AuthError> = None;
        let mut last_error = AuthError::invalid_signature();
        for (index, key) in service.keys().iter().enumerate() {
            match verify_with_deadline(token, key, self.freshness) {
                Ok((claims, valid_until)) => {
                    tracing::trace!(service = service.id(), key_index = index, valid_until, "token verified");
                    return Ok(Verified { service, claims, valid_until });
                },
                Err(err) => {
                    tracing::debug!(
                        service = service.id(),
                        key_index = index,
                        key_kind = %key.kind(),
                        error = %err,
                        "key rejected token"
                    );
                    if first_error.is_none() {
                        first_error = Some(err.clone());
                    }
                    last_error = err;
                },
            }
        }

        if let Some(first) = first_error
            && first != last_error
        {
            tracing::debug!(
                service = service.id(),
                first_error = %first,
                error = %last_error,
                "all keys rejected token"
            );
        }
        Err(last_error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        assert_auth_error,
        testutil::{
            EC_PUBLIC_KEY_A, RSA_PUBLIC_KEY_A, RSA_PUBLIC_KEY_B, craft_raw_token,
            create_signed_token, create_token_with_claims, ec_private_key_a, ec_private_key_b,
            rsa_private_key_a, rsa_private_key_b, rsa_rogue_key, test_registry,
        },
    };

    const HOUR: Duration = Duration::from_secs(3600);

    fn rsa_a() -> PublicKey {
        PublicKey::from_pem(RSA_PUBLIC_KEY_A.as_bytes()).unwrap()
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(Arc::new(test_registry()), HOUR)
    }

    // ---- extract_subject_unchecked ----

    #[test]
    fn test_extract_subject_ignores_signature() {
        let token = create_signed_token(&rsa_rogue_key(), "svc-a", 0, 3600);
        assert_eq!(extract_subject_unchecked(&token).unwrap(), "svc-a");
    }

    #[test]
    fn test_extract_subject_empty_signature_segment() {
        let token = craft_raw_token(&json!({"alg": "RS256"}), &json!({"sub": "svc-a"}));
        assert_eq!(extract_subject_unchecked(&token).unwrap(), "svc-a");
    }

    #[test]
    fn test_extract_subject_missing_or_empty() {
        let token = craft_raw_token(&json!({"alg": "RS256"}), &json!({"exp": 1}));
        assert_auth_error!(extract_subject_unchecked(&token), NoSubject);

        let token = craft_raw_token(&json!({"alg": "RS256"}), &json!({"sub": ""}));
        assert_auth_error!(extract_subject_unchecked(&token), NoSubject);
    }

    #[test]
    fn test_extract_subject_rejects_forbidden_algorithms() {
        for alg in ["none", "HS256", "HS384", "HS512", "PS256", "EdDSA"] {
            let token = craft_raw_token(&json!({"alg": alg}), &json!({"sub": "svc-a"}));
            assert_auth_error!(extract_subject_unchecked(&token), MalformedToken, alg);
        }
    }

    #[test]
    fn test_extract_subject_structural_failures() {
        let cases = [
            "",
            "not-a-jwt",
            "a.b",
            "a.b.c.d",
            "!!!.e30.",
            "e30.!!!.",
            "e30.e30.",
        ];
        for token in cases {
            assert_auth_error!(extract_subject_unchecked(token), MalformedToken, token);
        }
    }

    #[test]
    fn test_extract_subject_wrong_claim_type() {
        let token = craft_raw_token(&json!({"alg": "RS256"}), &json!({"sub": 42}));
        assert_auth_error!(extract_subject_unchecked(&token), MalformedToken);
    }

    // ---- verify_and_extract_claims ----

    #[test]
    fn test_verify_and_extract_claims_valid() {
        let token = create_signed_token(&rsa_private_key_a(), "svc-a", 0, 3600);
        let claims = verify_and_extract_claims(&token, &rsa_a(), HOUR).unwrap();
        assert_eq!(claims.sub, "svc-a");
        assert!(claims.exp.unwrap() > claims.iat.unwrap());
    }

    #[test]
    fn test_verify_and_extract_claims_all_rsa_algorithms() {
        for alg in [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512] {
            let key = rsa_private_key_a().with_algorithm(alg);
            let token = create_signed_token(&key, "svc-a", 0, 3600);
            assert!(verify_and_extract_claims(&token, &rsa_a(), HOUR).is_ok(), "{alg:?}");
        }
    }

    #[test]
    fn test_verify_and_extract_claims_wrong_key() {
        let token = create_signed_token(&rsa_private_key_b(), "svc-a", 0, 3600);
        assert_auth_error!(verify_and_extract_claims(&token, &rsa_a(), HOUR), InvalidSignature);
    }

    #[test]
    fn test_verify_and_extract_claims_unsigned_token() {
        let token = craft_raw_token(
            &json!({"alg": "RS256"}),
            &json!({"sub": "svc-a", "iat": Utc::now().timestamp(), "exp": i64::MAX}),
        );
        assert_auth_error!(verify_and_extract_claims(&token, &rsa_a(), HOUR), InvalidSignature);
    }

    #[test]
    fn test_signature_checked_before_time_bounds() {
        let token = create_signed_token(&rsa_private_key_b(), "svc-a", -7200, -60);
        assert_auth_error!(verify_and_extract_claims(&token, &rsa_a(), HOUR), InvalidSignature);
    }

    #[test]
    fn test_verify_and_extract_claims_expired() {
        let token = create_signed_token(&rsa_private_key_a(), "svc-a", -10, -1);
        assert_auth_error!(verify_and_extract_claims(&token, &rsa_a(), HOUR), TokenExpired);
    }

    #[test]
    fn test_verify_and_extract_claims_missing_exp() {
        let now = Utc::now().timestamp();
        let token = create_token_with_claims(&rsa_private_key_a(), &json!({"sub": "svc-a", "iat": now}));
        assert_auth_error!(verify_and_extract_claims(&token, &rsa_a(), HOUR), TokenExpired);
    }

    #[test]
    fn test_verify_and_extract_claims_too_old() {
        let token = create_signed_token(&rsa_private_key_a(), "svc-a", -7200, 3600);
        assert_auth_error!(verify_and_extract_claims(&token, &rsa_a(), HOUR), TokenTooOld);
    }

    #[test]
    fn test_verify_and_extract_claims_missing_iat() {
        let exp = Utc::now().timestamp() + 3600;
        let token = create_token_with_claims(&rsa_private_key_a(), &json!({"sub": "svc-a", "exp": exp}));
        assert_auth_error!(verify_and_extract_claims(&token, &rsa_a(), HOUR), TokenTooOld);
    }

    // ---- check_time_bounds ----

    fn claims(iat: Option<i64>, exp: Option<i64>) -> TokenClaims {
        TokenClaims { sub: "svc-a".into(), iat, exp, ..TokenClaims::default() }
    }

    #[test]
    fn test_time_bounds_exp_is_strict() {
        let now = 1_700_000_000;
        assert_auth_error!(check_time_bounds(&claims(Some(now), Some(now)), HOUR, now), TokenExpired);
        assert!(check_time_bounds(&claims(Some(now), Some(now + 1)), HOUR, now).is_ok());
    }

    #[test]
    fn test_time_bounds_freshness_edge() {
        let now = 1_700_000_000;
        let exp = Some(now + 10);
        assert!(check_time_bounds(&claims(Some(now - 3600), exp), HOUR, now).is_ok());
        assert_auth_error!(check_time_bounds(&claims(Some(now - 3601), exp), HOUR, now), TokenTooOld);
    }

    #[test]
    fn test_time_bounds_future_iat_rejected() {
        let now = 1_700_000_000;
        let exp = Some(now + 3600);
        assert!(check_time_bounds(&claims(Some(now), exp), HOUR, now).is_ok());
        assert_auth_error!(check_time_bounds(&claims(Some(now + 1), exp), HOUR, now), TokenNotYetValid);

        let ten_years = 10 * 365 * 86_400;
        let far = claims(Some(now + ten_years), Some(now + ten_years + 60));
        assert_auth_error!(check_time_bounds(&far, HOUR, now), TokenNotYetValid);
    }

    #[test]
    fn test_time_bounds_nbf() {
        let now = 1_700_000_000;
        let mut c = claims(Some(now), Some(now + 3600));
        c.nbf = Some(now + 30);
        assert_auth_error!(check_time_bounds(&c, HOUR, now), TokenNotYetValid);

        c.nbf = Some(now);
        assert!(check_time_bounds(&c, HOUR, now).is_ok());
        c.nbf = Some(now - 30);
        assert!(check_time_bounds(&c, HOUR, now).is_ok());
    }

    #[test]
    fn test_time_bounds_valid_until() {
        let now = 1_700_000_000;
        // Freshness runs out first.
        let c = claims(Some(now - 100), Some(now + 86_400));
        assert_eq!(check_time_bounds(&c, HOUR, now).unwrap(), now - 100 + 3601);
        assert_auth_error!(check_time_bounds(&c, HOUR, now - 100 + 3601), TokenTooOld);

        // Expiry comes first.
        let c = claims(Some(now), Some(now + 60));
        assert_eq!(check_time_bounds(&c, HOUR, now).unwrap(), now + 60);
    }

    #[test]
    fn test_time_bounds_expiry_checked_first() {
        let now = 1_700_000_000;
        assert_auth_error!(check_time_bounds(&claims(None, None), HOUR, now), TokenExpired);
    }

    #[test]
    fn test_time_bounds_huge_freshness_does_not_overflow() {
        let now = 1_700_000_000;
        let result = check_time_bounds(&claims(Some(0), Some(now + 1)), Duration::MAX, now);
        assert!(result.is_ok());
    }

    // ---- TokenVerifier ----

    #[test]
    fn test_verifier_resolves_service() {
        let token = create_signed_token(&rsa_private_key_a(), "svc-a", 0, 3600);
        let verified = verifier().verify(&token).unwrap();
        assert_eq!(verified.service.id(), "svc-a");
        assert_eq!(verified.claims.sub, "svc-a");
    }

    #[test]
    fn test_verifier_falls_back_to_later_key() {
        // svc-a trusts [RSA A, EC A]; an EC token fails the RSA key first.
        let token = create_signed_token(&ec_private_key_a(), "svc-a", 0, 3600);
        let verified = verifier().verify(&token).unwrap();
        assert_eq!(verified.service.id(), "svc-a");
    }

    #[test]
    fn test_verifier_valid_until_bounded_by_freshness() {
        let verifier = TokenVerifier::new(Arc::new(test_registry()), Duration::from_secs(60));
        let token = create_signed_token(&rsa_private_key_a(), "svc-a", 0, 86_400);
        let verified = verifier.verify(&token).unwrap();
        assert_eq!(verified.valid_until, verified.claims.iat.unwrap() + 61);
    }

    #[test]
    fn test_verifier_rejects_future_iat() {
        let now = Utc::now().timestamp();
        let ten_years = 10 * 365 * 86_400;
        let token = create_token_with_claims(
            &rsa_private_key_a(),
            &json!({"sub": "svc-a", "iat": now + ten_years, "exp": now + ten_years + 60}),
        );
        assert_auth_error!(verifier().verify(&token), InvalidSignature);

        // Only RSA A can verify the signature, so a single-key service surfaces the time error.
        let registry = ServiceRegistry::load(&[crate::testutil::service_definition(
            "svc",
            &["/"],
            &[RSA_PUBLIC_KEY_A],
        )])
        .unwrap();
        let token = create_token_with_claims(
            &rsa_private_key_a(),
            &json!({"sub": "svc", "iat": now + ten_years, "exp": now + ten_years + 60}),
        );
        let verifier = TokenVerifier::new(Arc::new(registry), HOUR);
        assert_auth_error!(verifier.verify(&token), TokenNotYetValid);
    }

    #[test]
    fn test_verifier_unknown_service() {
        let token = create_signed_token(&rsa_private_key_a(), "svc-unknown", 0, 3600);
        assert_auth_error!(verifier().verify(&token), ServiceNotFound);
    }

    #[test]
    fn test_verifier_key_of_other_service() {
        // RSA B belongs to svc-b, not svc-a.
        let token = create_signed_token(&rsa_private_key_b(), "svc-a", 0, 3600);
        assert_auth_error!(verifier().verify(&token), InvalidSignature);
    }

    #[test]
    fn test_verifier_returns_last_key_error() {
        // RSA A verifies and reports expiry, then EC A rejects the signature.
        let token = create_signed_token(&rsa_private_key_a(), "svc-a", -7200, -60);
        assert_auth_error!(verifier().verify(&token), InvalidSignature);

        // The last key is the one that verifies, so its expiry error wins.
        let token = create_signed_token(&ec_private_key_a(), "svc-a", -7200, -60);
        assert_auth_error!(verifier().verify(&token), TokenExpired);
    }

    #[test]
    fn test_verifier_unregistered_ec_key() {
        let token = create_signed_token(&ec_private_key_b(), "svc-a", 0, 3600);
        assert_auth_error!(verifier().verify(&token), InvalidSignature);
    }

    #[test]
    fn test_verifier_single_key_reports_its_error() {
        let registry = ServiceRegistry::load(&[crate::testutil::service_definition(
            "svc",
            &["/"],
            &[EC_PUBLIC_KEY_A],
        )])
        .unwrap();
        let verifier = TokenVerifier::new(Arc::new(registry), HOUR);

        let token = create_signed_token(&ec_private_key_a(), "svc", -7200, 3600);
        assert_auth_error!(verifier.verify(&token), TokenTooOld);

        let token = create_signed_token(&ec_private_key_a(), "svc", 0, -1);
        assert_auth_error!(verifier.verify(&token), TokenExpired);
    }

    #[test]
    fn test_verifier_rejects_hmac_with_public_key_secret() {
        // Algorithm confusion: HS256 keyed with the RSA public key PEM.
        let key = crate::testutil::TestSigningKey {
            encoding_key: jsonwebtoken::EncodingKey::from_secret(RSA_PUBLIC_KEY_B.as_bytes()),
            algorithm: Algorithm::HS256,
        };
        let token = create_signed_token(&key, "svc-b", 0, 3600);
        assert_auth_error!(verifier().verify(&token), MalformedToken);
    }
}
