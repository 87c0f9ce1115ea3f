//! `/vospace/nodes/<path>` handlers (spec §6).

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::Deserialize;

use crate::db::Detail;
use crate::dispatch::identity;
use crate::dispatch::AppState;
use crate::error::VoSpaceError;
use crate::model::path::NodePath;
use crate::xml::codec;

#[derive(Debug, Deserialize)]
pub struct NodeQuery {
    detail: Option<String>,
    limit: Option<usize>,
}

fn xml_response(status: StatusCode, body: String) -> Response {
    (status, [("content-type", "application/xml")], body).into_response()
}

async fn get_node(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_path): Path<String>,
    Query(query): Query<NodeQuery>,
) -> Result<Response, VoSpaceError> {
    let identity = identity::resolve(&headers)?;
    let path = NodePath::parse(&raw_path)?;
    let detail = match &query.detail {
        Some(raw) => Detail::parse(raw)?,
        None => Detail::Max,
    };
    if query.limit == Some(0) {
        return Err(VoSpaceError::InvalidArgument("limit must be positive".to_string()));
    }
    let limit = Some(query.limit.unwrap_or(state.directory_limit_cap).min(state.directory_limit_cap));

    let mut node = state.store.directory(&path, &identity, detail, limit).await?;

    if matches!(detail, Detail::Max) && node.data_fields().is_some() {
        let accepts = state.backend.get_accept_views(&node).await?;
        let provides = state.backend.get_provide_views(&node).await?;
        if let Some(data) = node.data_fields_mut() {
            data.accepts = accepts;
            data.provides = provides;
        }
    }

    let xml = codec::encode_node(&node, state.store.space_name())?;
    Ok(xml_response(StatusCode::OK, xml))
}

async fn create_node(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_path): Path<String>,
    body: String,
) -> Result<Response, VoSpaceError> {
    let identity = identity::resolve(&headers)?;
    let url_path = NodePath::parse(&raw_path)?;
    let node = codec::decode_node(&body)?;
    if node.path() != &url_path {
        return Err(VoSpaceError::InvalidUri("path in body does not match request URL".to_string()));
    }

    let created = state.store.create(node, &identity).await?;
    state.backend.create_storage_node(&created).await?;

    let xml = codec::encode_node(&created, state.store.space_name())?;
    Ok(xml_response(StatusCode::CREATED, xml))
}

async fn set_node_properties(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_path): Path<String>,
    body: String,
) -> Result<Response, VoSpaceError> {
    let identity = identity::resolve(&headers)?;
    let url_path = NodePath::parse(&raw_path)?;
    let parsed = codec::decode_node(&body)?;
    if parsed.path() != &url_path {
        return Err(VoSpaceError::InvalidUri("path in body does not match request URL".to_string()));
    }

    let updated = state.store.update(&url_path, parsed.properties().to_vec(), &identity).await?;

    let xml = codec::encode_node(&updated, state.store.space_name())?;
    Ok(xml_response(StatusCode::OK, xml))
}

async fn delete_node(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_path): Path<String>,
) -> Result<Response, VoSpaceError> {
    let identity = identity::resolve(&headers)?;
    let path = NodePath::parse(&raw_path)?;

    let removed = state.store.delete(&path, &identity).await?;
    for node in &removed {
        state.backend.delete_storage_node(node).await?;
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/vospace/nodes/*path", get(get_node))
        .route("/vospace/nodes/*path", put(create_node))
        .route("/vospace/nodes/*path", post(set_node_properties))
        .route("/vospace/nodes/*path", delete(delete_node))
        .with_state(state)
}

#[cfg(test)]
#[path = "nodes_test.rs"]
mod nodes_test;
