//! The Request Dispatcher (spec §4.D): a stateless translator from HTTP
//! onto the metadata store and transfer engine. Generalizes the teacher's
//! modular `dev_server` (one `Router` per concern, merged in `mod.rs`) to
//! the VOSpace HTTP surface (spec §6).

mod error;
mod identity;
mod nodes;
mod transfers;

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::db::MetadataStore;
use crate::engine::TransferEngine;
use crate::storage::StorageBackend;

/// The property URIs this deployment recognizes (spec §6,
/// `GET /vospace/properties`). The IVOA VOSpace core registry; embedders
/// wanting a richer set would extend this list, not replace the mechanism.
const KNOWN_PROPERTY_URIS: &[&str] = &[
    "ivo://ivoa.net/vospace/core#title",
    "ivo://ivoa.net/vospace/core#description",
    "ivo://ivoa.net/vospace/core#date",
    "ivo://ivoa.net/vospace/core#creator",
    "ivo://ivoa.net/vospace/core#length",
    "ivo://ivoa.net/vospace/core#MTime",
    "ivo://ivoa.net/vospace/core#contentEncoding",
    "ivo://ivoa.net/vospace/core#contentMD5",
];

const SUPPORTED_PROTOCOL_URIS: &[&str] = &[
    "ivo://ivoa.net/vospace/core#httpput",
    "ivo://ivoa.net/vospace/core#httpget",
    "ivo://ivoa.net/vospace/core#httpsput",
    "ivo://ivoa.net/vospace/core#httpsget",
];

/// State shared across every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: MetadataStore,
    pub engine: TransferEngine,
    pub backend: Arc<dyn StorageBackend>,
    pub directory_limit_cap: usize,
}

async fn list_protocols() -> Response {
    (axum::http::StatusCode::OK, SUPPORTED_PROTOCOL_URIS.join("\n")).into_response()
}

async fn list_properties(State(_state): State<AppState>) -> Response {
    (axum::http::StatusCode::OK, KNOWN_PROPERTY_URIS.join("\n")).into_response()
}

/// Build the full router: node CRUD, transfer jobs, and the two static
/// discovery endpoints.
pub fn router(state: AppState) -> Router {
    let discovery = Router::new()
        .route("/vospace/protocols", get(list_protocols))
        .route("/vospace/properties", get(list_properties))
        .with_state(state.clone());

    Router::new().merge(discovery).merge(nodes::routes(state.clone())).merge(transfers::routes(state))
}
