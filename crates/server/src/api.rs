//! HTTP surface: liveness and the auth-request endpoint.
//!
//! The proxy forwards the client's `Authorization` header and the original
//! request URI in `X-Original-URI`. The response body never carries internal
//! error detail; only the status code distinguishes the two denial kinds.

use std::sync::Arc;

use authgate_authn::{Authorizer, Decision, Denial};
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderName, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::get,
};

/// Request header carrying the URI the client originally asked for.
pub const ORIGINAL_URI_HEADER: HeaderName = HeaderName::from_static("x-original-uri");

/// Response header naming the authorized service.
pub const SERVICE_HEADER: HeaderName = HeaderName::from_static("x-authgate-service");

/// Shared handler state.
#[derive(Debug)]
pub struct AppState {
    /// Decision engine shared by all requests.
    pub authorizer: Authorizer,
}

/// Liveness probe.
///
/// GET / and GET /live
pub async fn live() -> &'static str {
    "OK\n"
}

/// Auth-request endpoint.
///
/// GET /{auth_endpoint}
pub async fn auth(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let original_uri = headers.get(ORIGINAL_URI_HEADER).and_then(|v| v.to_str().ok());

    match state.authorizer.decide_request(authorization, original_uri) {
        Decision::Allow { service_id } => {
            (StatusCode::OK, [(SERVICE_HEADER, service_id)], "OK\n").into_response()
        },
        Decision::Deny { error } => match error.denial() {
            Denial::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response(),
            Denial::Forbidden => (StatusCode::FORBIDDEN, "Forbidden\n").into_response(),
        },
    }
}

/// Normalizes a configured endpoint name to a route path.
///
/// Surrounding slashes are trimmed, so `"auth"`, `"/auth"` and `"/auth/"`
/// all serve `/auth`. Returns `None` when nothing is left.
#[must_use]
pub fn endpoint_route(auth_endpoint: &str) -> Option<String> {
    let trimmed = auth_endpoint.trim().trim_matches('/');
    (!trimmed.is_empty()).then(|| format!("/{trimmed}"))
}

/// Creates the router. `auth_route` must come from [`endpoint_route`].
pub fn create_router(state: Arc<AppState>, auth_route: &str) -> Router {
    Router::new()
        .route("/", get(live))
        .route("/live", get(live))
        .route(auth_route, get(auth))
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_route() {
        assert_eq!(endpoint_route("auth").as_deref(), Some("/auth"));
        assert_eq!(endpoint_route("/auth/").as_deref(), Some("/auth"));
        assert_eq!(endpoint_route("v1/check").as_deref(), Some("/v1/check"));
        assert_eq!(endpoint_route("/"), None);
        assert_eq!(endpoint_route("  "), None);
    }
}
