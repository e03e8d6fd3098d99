//! Allow/deny decisions for forwarded requests.
//!
//! [`Authorizer`] is the single entry point the HTTP layer calls. It runs the
//! cached token verification and then path authorization, and folds any
//! failure into [`Decision::Deny`].

use std::sync::Arc;

use crate::{
    cache::VerificationCache,
    config::AuthConfig,
    error::{AuthError, Denial},
    jwt::TokenVerifier,
    path,
    registry::ServiceRegistry,
};

/// Outcome of [`Authorizer::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed on behalf of `service_id`.
    Allow {
        /// Id of the service the token resolved to.
        service_id: String,
    },
    /// The request is refused. `error` is for logging only.
    Deny {
        /// The failure that caused the denial.
        error: AuthError,
    },
}

impl Decision {
    /// Whether the request is allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    /// The allowed service id, if any.
    #[must_use]
    pub fn service_id(&self) -> Option<&str> {
        match self {
            Decision::Allow { service_id } => Some(service_id),
            Decision::Deny { .. } => None,
        }
    }

    /// The external denial category, if denied.
    #[must_use]
    pub fn denial(&self) -> Option<Denial> {
        match self {
            Decision::Allow { .. } => None,
            Decision::Deny { error } => Some(error.denial()),
        }
    }
}

/// Strips an optional `Bearer ` prefix from an `Authorization` header value.
///
/// ```
/// use authgate_authn::decision::strip_bearer;
///
/// assert_eq!(strip_bearer("Bearer abc.def.ghi"), "abc.def.ghi");
/// assert_eq!(strip_bearer("abc.def.ghi"), "abc.def.ghi");
/// ```
#[must_use]
pub fn strip_bearer(header: &str) -> &str {
    header.strip_prefix("Bearer ").unwrap_or(header)
}

/// Composes verification, caching, and path authorization.
#[derive(Debug)]
pub struct Authorizer {
    verifier: TokenVerifier,
    cache: VerificationCache,
}

impl Authorizer {
    /// Creates an authorizer over `registry` using `config`'s tunables.
    #[must_use]
    pub fn new(registry: Arc<ServiceRegistry>, config: &AuthConfig) -> Self {
        Self::with_parts(
            TokenVerifier::new(registry, config.freshness()),
            VerificationCache::from_config(config),
        )
    }

    /// Creates an authorizer from an existing verifier and cache.
    #[must_use]
    pub fn with_parts(verifier: TokenVerifier, cache: VerificationCache) -> Self {
        Self { verifier, cache }
    }

    /// The underlying verifier.
    #[must_use]
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// The verification cache.
    #[must_use]
    pub fn cache(&self) -> &VerificationCache {
        &self.cache
    }

    /// Decides whether `token` may access `request_path`.
    ///
    /// The token is checked before the path, so an invalid token is always
    /// [`Denial::Unauthorized`] regardless of the path.
    #[tracing::instrument(skip_all, fields(path = request_path))]
    pub fn decide(&self, token: &str, request_path: &str) -> Decision {
        match self.evaluate(token, request_path) {
            Ok(service_id) => {
                tracing::info!(service = %service_id, "authorized");
                Decision::Allow { service_id }
            },
            Err(error) => {
                let denial = error.denial();
                match denial {
                    Denial::Unauthorized => {
                        tracing::warn!(error = %error, denial = denial.as_str(), "failed to authorize token");
                    },
                    Denial::Forbidden => {
                        tracing::warn!(error = %error, denial = denial.as_str(), "access not allowed");
                    },
                }
                Decision::Deny { error }
            },
        }
    }

    /// Decides from raw header values as forwarded by the proxy.
    ///
    /// A missing or empty `authorization` is [`AuthError::MissingToken`]; a
    /// missing `original_uri` is treated as an empty path.
    pub fn decide_request(&self, authorization: Option<&str>, original_uri: Option<&str>) -> Decision {
        let token = authorization.map(strip_bearer).unwrap_or_default();
        if token.is_empty() {
            tracing::warn!(denial = Denial::Unauthorized.as_str(), "missing bearer token");
            return Decision::Deny { error: AuthError::missing_token() };
        }
        self.decide(token, original_uri.unwrap_or_default())
    }

    fn evaluate(&self, token: &str, request_path: &str) -> Result<String, AuthError> {
        let service = self.cache.get_or_verify(token, |t| self.verifier.verify(t))?;
        path::authorize(request_path, &service)?;
        Ok(service.id().to_owned())
    }
}
