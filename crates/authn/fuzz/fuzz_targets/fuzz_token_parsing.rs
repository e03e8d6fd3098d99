//! Fuzz target for unverified token parsing and path authorization.
//!
//! Feeds arbitrary strings as bearer tokens and request paths. Every result
//! must be either `Ok(...)` or `Err(AuthError)`, never a panic.

#![no_main]

use authgate_authn::{
    Service,
    jwt::extract_subject_unchecked,
    path::{authorize, normalize_path, strip_query},
    strip_bearer,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Only process valid UTF-8; header values reach us as strings
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    // Split the input so one run covers both a token and a path
    let (token, path) = input.split_once('\n').unwrap_or((input, input));

    if let Ok(subject) = extract_subject_unchecked(strip_bearer(token)) {
        assert!(!subject.is_empty(), "an extracted subject is never empty");
    }

    let normalized = normalize_path(strip_query(path));
    assert!(normalized.starts_with('/') && normalized.ends_with('/'));

    let service = Service::new("fuzz", ["/api/", path], Vec::new());
    let _ = authorize(path, &service);
});
