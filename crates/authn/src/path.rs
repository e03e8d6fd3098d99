//! Request path authorization.
//!
//! Paths are compared as plain strings after normalization: both the
//! configured prefixes and the incoming request path are forced to start and
//! end with `/`. This makes `"api"`, `"/api"` and `"/api/"` equivalent, and
//! keeps `/api` from matching `/apix`.

use crate::{error::AuthError, registry::Service};

/// Ensures `path` starts and ends with `/`.
///
/// # Examples
///
/// ```
/// use authgate_authn::path::normalize_path;
///
/// assert_eq!(normalize_path("api"), "/api/");
/// assert_eq!(normalize_path("/api/"), "/api/");
/// assert_eq!(normalize_path("/api/v1/users"), "/api/v1/users/");
/// ```
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 2);
    if !path.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(path);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Removes a `?query` suffix, if any.
#[must_use]
pub fn strip_query(path: &str) -> &str {
    match path.split_once('?') {
        Some((path, _query)) => path,
        None => path,
    }
}

/// Checks `request_path` against the service's allowed prefixes.
///
/// The query string is ignored, and the remaining path is normalized before
/// matching. Any matching prefix grants access.
///
/// # Errors
///
/// - [`AuthError::EmptyPath`] if `request_path` is empty
/// - [`AuthError::PathDenied`] if no prefix matches
pub fn authorize(request_path: &str, service: &Service) -> Result<(), AuthError> {
    if request_path.is_empty() {
        return Err(AuthError::empty_path());
    }

    let normalized = normalize_path(strip_query(request_path));
    if service.paths().iter().any(|prefix| normalized.starts_with(prefix.as_str())) {
        return Ok(());
    }

    Err(AuthError::path_denied(normalized))
}
