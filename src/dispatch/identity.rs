//! Identity resolution (spec §4.D: "Resolve identity; if absent,
//! `PermissionDenied`").
//!
//! User/group directories are out of scope, so the dispatcher trusts a
//! single request header naming the caller. A real deployment would swap
//! this for a proper authentication layer without touching any other part
//! of the dispatcher.

use axum::http::HeaderMap;

use crate::error::VoSpaceError;
use crate::identity::Identity;

const IDENTITY_HEADER: &str = "x-vospace-identity";

pub fn resolve(headers: &HeaderMap) -> Result<Identity, VoSpaceError> {
    let raw = headers
        .get(IDENTITY_HEADER)
        .ok_or_else(|| VoSpaceError::PermissionDenied("credentials not found".to_string()))?;
    let value = raw
        .to_str()
        .map_err(|_| VoSpaceError::PermissionDenied("credentials not found".to_string()))?;
    if value.is_empty() {
        return Err(VoSpaceError::PermissionDenied("credentials not found".to_string()));
    }
    Ok(Identity::new(value))
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod identity_test;
