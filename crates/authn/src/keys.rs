//! Trusted public key material.
//!
//! A [`PublicKey`] is parsed once from PEM at registry construction and then
//! only ever used through [`PublicKey::verify_signature`]. The key kind is
//! decided by which parser accepts the PEM: RSA is attempted first, then EC.

use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey};

use crate::validation::algorithms_for;

/// Discriminant of a [`PublicKey`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// RSA public key (RS256/RS384/RS512).
    Rsa,
    /// Elliptic-curve public key (ES256/ES384).
    Ecdsa,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Rsa => f.write_str("rsa"),
            KeyKind::Ecdsa => f.write_str("ecdsa"),
        }
    }
}

/// A trusted public key belonging to a registered service.
#[derive(Clone)]
pub enum PublicKey {
    /// RSA public key.
    Rsa(DecodingKey),
    /// Elliptic-curve public key.
    Ecdsa(DecodingKey),
}

impl PublicKey {
    /// Parses a PEM-encoded public key, trying RSA first and then EC.
    ///
    /// Both SPKI (`BEGIN PUBLIC KEY`) and PKCS#1 (`BEGIN RSA PUBLIC KEY`)
    /// encodings are accepted for RSA.
    ///
    /// # Errors
    ///
    /// Returns the EC parser's error if neither parser accepts the input.
    pub fn from_pem(pem: &[u8]) -> Result<Self, jsonwebtoken::errors::Error> {
        if let Ok(key) = DecodingKey::from_rsa_pem(pem) {
            return Ok(PublicKey::Rsa(key));
        }
        DecodingKey::from_ec_pem(pem).map(PublicKey::Ecdsa)
    }

    /// Returns the kind of this key.
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        match self {
            PublicKey::Rsa(_) => KeyKind::Rsa,
            PublicKey::Ecdsa(_) => KeyKind::Ecdsa,
        }
    }

    /// Returns whether this key can verify signatures made with `alg`.
    #[must_use]
    pub fn supports(&self, alg: Algorithm) -> bool {
        algorithms_for(self.kind()).contains(&alg)
    }

    /// Verifies a base64url `signature` over `message` with this key.
    ///
    /// Returns `false` for an algorithm of the wrong family, a malformed
    /// signature, or a signature that does not match.
    #[must_use]
    pub fn verify_signature(&self, message: &[u8], signature: &str, alg: Algorithm) -> bool {
        if !self.supports(alg) {
            return false;
        }
        let key = match self {
            PublicKey::Rsa(key) | PublicKey::Ecdsa(key) => key,
        };
        jsonwebtoken::crypto::verify(signature, message, key, alg).unwrap_or(false)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.kind()).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testutil::{
        EC_PUBLIC_KEY_A, RSA_PKCS1_PUBLIC_KEY_A, RSA_PUBLIC_KEY_A, RSA_PUBLIC_KEY_B,
        create_signed_token, ec_private_key_a, rsa_private_key_a,
    };

    fn split(token: &str) -> (&str, &str) {
        token.rsplit_once('.').expect("token has a signature segment")
    }

    #[test]
    fn test_rsa_pem_parses_as_rsa() {
        let key = PublicKey::from_pem(RSA_PUBLIC_KEY_A.as_bytes()).unwrap();
        assert_eq!(key.kind(), KeyKind::Rsa);
    }

    #[test]
    fn test_pkcs1_rsa_pem_parses_as_rsa() {
        let key = PublicKey::from_pem(RSA_PKCS1_PUBLIC_KEY_A.as_bytes()).unwrap();
        assert_eq!(key.kind(), KeyKind::Rsa);
    }

    #[test]
    fn test_ec_pem_parses_as_ecdsa() {
        let key = PublicKey::from_pem(EC_PUBLIC_KEY_A.as_bytes()).unwrap();
        assert_eq!(key.kind(), KeyKind::Ecdsa);
    }

    #[test]
    fn test_garbage_pem_rejected() {
        assert!(PublicKey::from_pem(b"not a key").is_err());
        assert!(PublicKey::from_pem(b"").is_err());
    }

    #[test]
    fn test_supports_only_own_family() {
        let rsa = PublicKey::from_pem(RSA_PUBLIC_KEY_A.as_bytes()).unwrap();
        assert!(rsa.supports(Algorithm::RS256));
        assert!(rsa.supports(Algorithm::RS512));
        assert!(!rsa.supports(Algorithm::ES256));
        assert!(!rsa.supports(Algorithm::HS256));

        let ec = PublicKey::from_pem(EC_PUBLIC_KEY_A.as_bytes()).unwrap();
        assert!(ec.supports(Algorithm::ES256));
        assert!(!ec.supports(Algorithm::RS256));
    }

    #[test]
    fn test_verify_signature_with_matching_key() {
        let token = create_signed_token(&rsa_private_key_a(), "svc-a", 0, 3600);
        let (message, signature) = split(&token);

        let key = PublicKey::from_pem(RSA_PUBLIC_KEY_A.as_bytes()).unwrap();
        assert!(key.verify_signature(message.as_bytes(), signature, Algorithm::RS256));
    }

    #[test]
    fn test_verify_signature_with_other_key_fails() {
        let token = create_signed_token(&rsa_private_key_a(), "svc-a", 0, 3600);
        let (message, signature) = split(&token);

        let key = PublicKey::from_pem(RSA_PUBLIC_KEY_B.as_bytes()).unwrap();
        assert!(!key.verify_signature(message.as_bytes(), signature, Algorithm::RS256));
    }

    #[test]
    fn test_verify_signature_wrong_family_fails() {
        let token = create_signed_token(&ec_private_key_a(), "svc-a", 0, 3600);
        let (message, signature) = split(&token);

        let rsa = PublicKey::from_pem(RSA_PUBLIC_KEY_A.as_bytes()).unwrap();
        assert!(!rsa.verify_signature(message.as_bytes(), signature, Algorithm::ES256));

        let ec = PublicKey::from_pem(EC_PUBLIC_KEY_A.as_bytes()).unwrap();
        assert!(ec.verify_signature(message.as_bytes(), signature, Algorithm::ES256));
    }

    #[test]
    fn test_verify_signature_tampered_message_fails() {
        let token = create_signed_token(&rsa_private_key_a(), "svc-a", 0, 3600);
        let (message, signature) = split(&token);
        let tampered = format!("{message}x");

        let key = PublicKey::from_pem(RSA_PUBLIC_KEY_A.as_bytes()).unwrap();
        assert!(!key.verify_signature(tampered.as_bytes(), signature, Algorithm::RS256));
        assert!(!key.verify_signature(message.as_bytes(), "!!!", Algorithm::RS256));
    }

    #[test]
    fn test_debug_hides_key_material() {
        let key = PublicKey::from_pem(EC_PUBLIC_KEY_A.as_bytes()).unwrap();
        assert_eq!(format!("{key:?}"), "PublicKey(Ecdsa)");
    }
}
