//! # Authgate Authentication
//!
//! Bearer token verification and path authorization for the authgate
//! decision service.
//!
//! This crate provides:
//! - **Service registry**: services, their allowed path prefixes and trusted public keys
//! - **Token verification**: unverified subject lookup, then signature and time checks with
//!   multi-key fallback
//! - **Verification cache**: TTL-bounded memo of verified tokens with batch pruning
//! - **Decisions**: a single [`Authorizer::decide`] entry point returning allow or deny
//!
//! ## Security
//!
//! - Only asymmetric algorithms (RS256/384/512, ES256/384) are supported
//! - Symmetric algorithms (HS256, etc.) and `none` are rejected before any key lookup
//! - A token's `iat` must fall within the freshness window even when `exp` is far away
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use authgate_authn::{AuthConfig, Authorizer, ServiceRegistry};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ServiceRegistry::from_file("services.toml")?;
//! let authorizer = Authorizer::new(Arc::new(registry), &AuthConfig::default());
//!
//! let decision = authorizer.decide_request(Some("Bearer eyJhbGciOiJSUzI1NiJ9..."), Some("/api/v1"));
//! println!("allowed: {}", decision.is_allowed());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Verification result cache.
pub mod cache;
/// Services file and tunables.
pub mod config;
/// Allow/deny decisions.
pub mod decision;
/// Authentication error types.
pub mod error;
/// Token parsing and verification.
pub mod jwt;
/// Public key material.
pub mod keys;
/// Request path authorization.
pub mod path;
/// Service registry.
pub mod registry;
/// Algorithm validation.
pub mod validation;

/// Shared test helpers.
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

// Re-export key types for convenience
pub use cache::{CacheStats, VerificationCache};
pub use config::{AuthConfig, ServiceDefinition, ServicesFile};
pub use decision::{Authorizer, Decision, strip_bearer};
pub use error::{AuthError, ConfigError, Denial, Result};
pub use jwt::{TokenClaims, TokenVerifier, Verified};
pub use keys::{KeyKind, PublicKey};
pub use registry::{Service, ServiceRegistry};
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
