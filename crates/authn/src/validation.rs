//! JWT algorithm validation.
//!
//! Only asymmetric RSA and EC algorithms are ever accepted, at both the
//! unverified and the verified parsing stage. Symmetric algorithms and
//! `none` are rejected outright to rule out algorithm-confusion attacks where
//! a public key is replayed as an HMAC secret.

use jsonwebtoken::Algorithm;

use crate::{error::AuthError, keys::KeyKind};

/// Forbidden JWT algorithms that are never accepted.
///
/// - `none`: no signature at all
/// - `HS256`, `HS384`, `HS512`: symmetric, the verifier only holds public keys
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Accepted JWT algorithms, RSA family first.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["RS256", "RS384", "RS512", "ES256", "ES384"];

/// RSA algorithms a [`KeyKind::Rsa`] key may verify.
pub const RSA_ALGORITHMS: &[Algorithm] = &[Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// EC algorithms a [`KeyKind::Ecdsa`] key may verify.
pub const EC_ALGORITHMS: &[Algorithm] = &[Algorithm::ES256, Algorithm::ES384];

/// Validate a JWT `alg` header value against the allow-list.
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] if the algorithm is forbidden or not
/// in [`ACCEPTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use authgate_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("RS256").is_ok());
/// assert!(validate_algorithm("ES384").is_ok());
/// assert!(validate_algorithm("HS256").is_err());
/// assert!(validate_algorithm("PS256").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<Algorithm, AuthError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(AuthError::malformed_token(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    match alg {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        "ES256" => Ok(Algorithm::ES256),
        "ES384" => Ok(Algorithm::ES384),
        _ => Err(AuthError::malformed_token(format!(
            "Algorithm '{alg}' is not in accepted list"
        ))),
    }
}

/// Returns the algorithms a key of the given kind may verify.
#[must_use]
pub fn algorithms_for(kind: KeyKind) -> &'static [Algorithm] {
    match kind {
        KeyKind::Rsa => RSA_ALGORITHMS,
        KeyKind::Ecdsa => EC_ALGORITHMS,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_algorithm_rsa_family_accepted() {
        assert_eq!(validate_algorithm("RS256").unwrap(), Algorithm::RS256);
        assert_eq!(validate_algorithm("RS384").unwrap(), Algorithm::RS384);
        assert_eq!(validate_algorithm("RS512").unwrap(), Algorithm::RS512);
    }

    #[test]
    fn test_validate_algorithm_ec_family_accepted() {
        assert_eq!(validate_algorithm("ES256").unwrap(), Algorithm::ES256);
        assert_eq!(validate_algorithm("ES384").unwrap(), Algorithm::ES384);
    }

    #[test]
    fn test_forbidden_algorithms_each_rejected_with_security_message() {
        for alg in FORBIDDEN_ALGORITHMS {
            let result = validate_algorithm(alg);
            assert!(
                matches!(result, Err(AuthError::MalformedToken { ref message }) if message.contains("not allowed for security reasons")),
                "Expected security rejection for forbidden algorithm '{alg}'"
            );
        }
    }

    #[test]
    fn test_validate_algorithm_not_in_list() {
        for alg in ["PS256", "EdDSA", "rs256", ""] {
            let result = validate_algorithm(alg);
            assert!(
                matches!(result, Err(AuthError::MalformedToken { ref message }) if message.contains("not in accepted list")),
                "'{alg}' should not be accepted"
            );
        }
    }

    #[test]
    fn test_accepted_algorithms_match_key_families() {
        for name in ACCEPTED_ALGORITHMS {
            let alg = validate_algorithm(name).unwrap();
            let in_rsa = RSA_ALGORITHMS.contains(&alg);
            let in_ec = EC_ALGORITHMS.contains(&alg);
            assert!(in_rsa ^ in_ec, "{name} must belong to exactly one key family");
        }
    }

    #[test]
    fn test_algorithms_for_kind() {
        assert_eq!(algorithms_for(KeyKind::Rsa), RSA_ALGORITHMS);
        assert_eq!(algorithms_for(KeyKind::Ecdsa), EC_ALGORITHMS);
    }
}
