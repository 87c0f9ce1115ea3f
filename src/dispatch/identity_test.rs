use axum::http::{HeaderMap, HeaderValue};

use super::*;

#[test]
fn missing_header_is_permission_denied() {
    let headers = HeaderMap::new();
    let err = resolve(&headers).unwrap_err();
    assert!(matches!(err, VoSpaceError::PermissionDenied(_)));
}

#[test]
fn empty_header_is_permission_denied() {
    let mut headers = HeaderMap::new();
    headers.insert(IDENTITY_HEADER, HeaderValue::from_static(""));
    let err = resolve(&headers).unwrap_err();
    assert!(matches!(err, VoSpaceError::PermissionDenied(_)));
}

#[test]
fn present_header_resolves_to_identity() {
    let mut headers = HeaderMap::new();
    headers.insert(IDENTITY_HEADER, HeaderValue::from_static("alice"));
    let identity = resolve(&headers).unwrap();
    assert_eq!(identity.as_str(), "alice");
}
