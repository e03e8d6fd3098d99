//! Authentication and configuration error types.
//!
//! Two families live here:
//!
//! - [`AuthError`]: per-request failures. Never fatal, every one of them ends up as a
//!   [`Denial`] at the [`Authorizer`](crate::decision::Authorizer) boundary.
//! - [`ConfigError`]: startup failures while building the
//!   [`ServiceRegistry`](crate::registry::ServiceRegistry) or validating tunables. The process
//!   must not start serving when one of these occurs.

use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Coarse external outcome for a denied request.
///
/// Callers outside this crate only ever see one of these two categories. The
/// originating [`AuthError`] stays internal and is only logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Denial {
    /// The bearer token could not be verified (maps to HTTP 401).
    Unauthorized,
    /// The token is valid but the requested path is not allowed (maps to HTTP 403).
    Forbidden,
}

impl Denial {
    /// Returns the canonical lowercase name, suitable for structured log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Denial::Unauthorized => "unauthorized",
            Denial::Forbidden => "forbidden",
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request authentication and authorization errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`, so new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// No bearer token was supplied.
    #[error("Missing bearer token")]
    MissingToken,

    /// Token cannot be decoded, or uses an algorithm outside the allow-list.
    #[error("Malformed token: {message}")]
    MalformedToken {
        /// Description of what could not be decoded.
        message: String,
    },

    /// Token decoded but carries an empty `sub` claim.
    #[error("Token has no subject")]
    NoSubject,

    /// The `sub` claim names no registered service.
    #[error("Service not found: {id}")]
    ServiceNotFound {
        /// Service identifier taken from the token subject.
        id: String,
    },

    /// Signature did not verify against the attempted key.
    #[error("Invalid signature")]
    InvalidSignature,

    /// `exp` is missing or not in the future.
    #[error("Token expired")]
    TokenExpired,

    /// `iat` is missing or older than the configured freshness window.
    #[error("Token too old")]
    TokenTooOld,

    /// `iat` or `nbf` lies in the future.
    #[error("Token not yet valid")]
    TokenNotYetValid,

    /// No request path was supplied.
    #[error("Missing request path")]
    EmptyPath,

    /// The request path matches none of the service's allowed prefixes.
    #[error("Path not allowed: {path}")]
    PathDenied {
        /// Normalized request path that was denied.
        path: String,
    },
}

impl AuthError {
    /// Creates a new `MissingToken` error.
    #[must_use]
    pub fn missing_token() -> Self {
        Self::MissingToken
    }

    /// Creates a new `MalformedToken` error with the given message.
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken { message: message.into() }
    }

    /// Creates a new `NoSubject` error.
    #[must_use]
    pub fn no_subject() -> Self {
        Self::NoSubject
    }

    /// Creates a new `ServiceNotFound` error for the given service id.
    #[must_use]
    pub fn service_not_found(id: impl Into<String>) -> Self {
        Self::ServiceNotFound { id: id.into() }
    }

    /// Creates a new `InvalidSignature` error.
    #[must_use]
    pub fn invalid_signature() -> Self {
        Self::InvalidSignature
    }

    /// Creates a new `TokenExpired` error.
    #[must_use]
    pub fn token_expired() -> Self {
        Self::TokenExpired
    }

    /// Creates a new `TokenTooOld` error.
    #[must_use]
    pub fn token_too_old() -> Self {
        Self::TokenTooOld
    }

    /// Creates a new `TokenNotYetValid` error.
    #[must_use]
    pub fn token_not_yet_valid() -> Self {
        Self::TokenNotYetValid
    }

    /// Creates a new `EmptyPath` error.
    #[must_use]
    pub fn empty_path() -> Self {
        Self::EmptyPath
    }

    /// Creates a new `PathDenied` error for the given path.
    #[must_use]
    pub fn path_denied(path: impl Into<String>) -> Self {
        Self::PathDenied { path: path.into() }
    }

    /// Maps this error onto the external outcome category.
    ///
    /// Path-stage failures are [`Denial::Forbidden`]; everything raised while
    /// verifying the token is [`Denial::Unauthorized`].
    #[must_use]
    pub fn denial(&self) -> Denial {
        match self {
            AuthError::EmptyPath | AuthError::PathDenied { .. } => Denial::Forbidden,
            _ => Denial::Unauthorized,
        }
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Startup configuration errors.
///
/// Any of these aborts startup; there is no recovery path.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The services file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The services file is not valid TOML or does not match the expected shape.
    #[error("Failed to parse services file: {source}")]
    Parse {
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The configuration defines no services at all.
    #[error("No services defined")]
    NoServices,

    /// A service definition has an empty `id`.
    #[error("Service id is empty")]
    EmptyServiceId,

    /// A service id contains characters that cannot be echoed in a response
    /// header.
    #[error("Invalid service id {id:?}")]
    InvalidServiceId {
        /// The rejected id.
        id: String,
    },

    /// A service definition has no `paths`.
    #[error("No paths in {service}")]
    NoPaths {
        /// Offending service id.
        service: String,
    },

    /// A service definition has no `public_keys`.
    #[error("No public keys in {service}")]
    NoPublicKeys {
        /// Offending service id.
        service: String,
    },

    /// Two service definitions share the same id.
    #[error("Service {id} is already defined")]
    DuplicateService {
        /// The duplicated id.
        id: String,
    },

    /// A path entry cannot be used as a prefix.
    #[error("Invalid path {path:?} in {service}")]
    InvalidPath {
        /// Offending service id.
        service: String,
        /// The rejected path as written in the configuration.
        path: String,
    },

    /// A PEM public key parsed as neither RSA nor EC.
    #[error("Failed to read public key #{index} in {service}: {source}")]
    InvalidPublicKey {
        /// Offending service id.
        service: String,
        /// Zero-based position of the key within the service definition.
        index: usize,
        /// Error from the last parse attempt.
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    /// A tunable is below its allowed minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// Name of the tunable.
        field: &'static str,
        /// Rejected value, rendered for display.
        value: String,
        /// Minimum accepted value, rendered for display.
        min: String,
    },
}

impl ConfigError {
    /// Creates a new `NoPaths` error.
    #[must_use]
    pub fn no_paths(service: impl Into<String>) -> Self {
        Self::NoPaths { service: service.into() }
    }

    /// Creates a new `NoPublicKeys` error.
    #[must_use]
    pub fn no_public_keys(service: impl Into<String>) -> Self {
        Self::NoPublicKeys { service: service.into() }
    }

    /// Creates a new `DuplicateService` error.
    #[must_use]
    pub fn duplicate_service(id: impl Into<String>) -> Self {
        Self::DuplicateService { id: id.into() }
    }

    /// Creates a new `InvalidPath` error.
    #[must_use]
    pub fn invalid_path(service: impl Into<String>, path: impl Into<String>) -> Self {
        Self::InvalidPath { service: service.into(), path: path.into() }
    }
}
