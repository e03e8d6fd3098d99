//! Offline token issuance.
//!
//! Signs a token the decision endpoint will accept: `sub` names the service,
//! `iat` is now and `exp` is `iat + max_age`. RSA keys sign with RS256, EC
//! P-256 keys with ES256 and EC P-384 keys with ES384.

use std::{fs, path::Path, time::Duration};

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

/// Token issuance errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IssueError {
    /// The private key file could not be read.
    #[error("Failed to read private key {}: {source}", path.display())]
    Read {
        /// Path that was being read.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The PEM parsed as neither an RSA nor a P-256/P-384 EC private key.
    #[error("Could not parse private key: {source}")]
    InvalidKey {
        /// Error from the EC parse attempt.
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    /// `max_age` does not fit a timestamp.
    #[error("max age {0:?} is too large")]
    MaxAgeTooLarge(Duration),

    /// Signing failed.
    #[error("Failed to sign token: {source}")]
    Sign {
        /// Underlying signing error.
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

#[derive(Debug, Serialize)]
struct IssuedClaims<'a> {
    sub: &'a str,
    iss: &'a str,
    iat: i64,
    exp: i64,
}

/// Signs a token for `subject` with the PEM private key in `pem`.
///
/// # Errors
///
/// Returns [`IssueError::InvalidKey`] if the key is not RSA, P-256 or P-384,
/// [`IssueError::MaxAgeTooLarge`] for an unrepresentable lifetime, or
/// [`IssueError::Sign`] if signing fails.
pub fn issue_token(
    pem: &[u8],
    subject: &str,
    max_age: Duration,
    issuer: &str,
) -> Result<String, IssueError> {
    let max_age_secs =
        i64::try_from(max_age.as_secs()).map_err(|_| IssueError::MaxAgeTooLarge(max_age))?;
    let iat = Utc::now().timestamp();
    let exp = iat.checked_add(max_age_secs).ok_or(IssueError::MaxAgeTooLarge(max_age))?;
    let claims = IssuedClaims { sub: subject, iss: issuer, iat, exp };

    let (token, algorithm) = match EncodingKey::from_rsa_pem(pem) {
        Ok(key) => jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map(|token| (token, Algorithm::RS256))
            .map_err(|source| IssueError::Sign { source })?,
        Err(_) => {
            let key =
                EncodingKey::from_ec_pem(pem).map_err(|source| IssueError::InvalidKey { source })?;
            sign_ec(&claims, &key)?
        },
    };

    tracing::debug!(subject, alg = ?algorithm, exp, "issued token");
    Ok(token)
}

/// The curve is only known once signing is attempted, so P-256 is tried
/// first and then P-384.
fn sign_ec(claims: &IssuedClaims<'_>, key: &EncodingKey) -> Result<(String, Algorithm), IssueError> {
    match jsonwebtoken::encode(&Header::new(Algorithm::ES256), claims, key) {
        Ok(token) => Ok((token, Algorithm::ES256)),
        Err(_) => jsonwebtoken::encode(&Header::new(Algorithm::ES384), claims, key)
            .map(|token| (token, Algorithm::ES384))
            .map_err(|source| IssueError::InvalidKey { source }),
    }
}

/// Reads the private key at `path` and calls [`issue_token`].
///
/// The key bytes are zeroed when dropped.
///
/// # Errors
///
/// Returns [`IssueError::Read`] if the file cannot be read, otherwise any
/// error from [`issue_token`].
pub fn issue_token_from_file(
    path: impl AsRef<Path>,
    subject: &str,
    max_age: Duration,
    issuer: &str,
) -> Result<String, IssueError> {
    let path = path.as_ref();
    let pem = Zeroizing::new(
        fs::read(path).map_err(|source| IssueError::Read { path: path.to_path_buf(), source })?,
    );
    issue_token(&pem, subject, max_age, issuer)
}
