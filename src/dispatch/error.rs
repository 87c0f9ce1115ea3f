//! Maps [`VoSpaceError`] onto an HTTP response (spec §7).
//!
//! The dispatcher only ever needs to reason about `VoSpaceError`; every
//! lower-layer error (`DatabaseError`, `XmlError`) already chains into it
//! via `#[from]`, so a single `IntoResponse` impl here closes the loop.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::VoSpaceError;

impl IntoResponse for VoSpaceError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;
