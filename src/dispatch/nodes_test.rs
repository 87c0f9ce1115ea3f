use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use super::*;
use crate::engine::TransferEngine;
use crate::storage::NullBackend;

async fn new_state() -> (TempDir, AppState) {
    let dir = TempDir::new().unwrap();
    let store = crate::db::MetadataStore::new(&dir.path().join("vospace.db"), "example.org").await.unwrap();
    let engine = TransferEngine::new(store.clone(), Arc::new(NullBackend), Vec::new(), Duration::from_millis(50));
    (dir, AppState { store, engine, backend: Arc::new(NullBackend), directory_limit_cap: 10_000 })
}

fn node_xml(space: &str, path: &str, node_type: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?><node xmlns=\"http://www.ivoa.net/xml/VOSpace/v2.1\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" uri=\"vos://{space}!vospace/{path}\" \
         xsi:type=\"{node_type}\"/>"
    )
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn create_then_get_round_trips_a_container_node() {
    let (_dir, state) = new_state().await;
    let space = state.store.space_name().to_string();
    let router = routes(state);

    let create = Request::builder()
        .method("PUT")
        .uri("/vospace/nodes/c")
        .header("x-vospace-identity", "alice")
        .body(Body::from(node_xml(&space, "c", "vos:ContainerNode")))
        .unwrap();
    let response = router.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let get = Request::builder()
        .method("GET")
        .uri("/vospace/nodes/c")
        .header("x-vospace-identity", "alice")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert!(text.contains("vos:ContainerNode"));
}

#[tokio::test]
async fn get_without_identity_is_permission_denied() {
    let (_dir, state) = new_state().await;
    let router = routes(state);

    let request = Request::builder().method("GET").uri("/vospace/nodes/x").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_rejects_a_body_path_mismatch() {
    let (_dir, state) = new_state().await;
    let space = state.store.space_name().to_string();
    let router = routes(state);

    let request = Request::builder()
        .method("PUT")
        .uri("/vospace/nodes/other")
        .header("x-vospace-identity", "alice")
        .body(Body::from(node_xml(&space, "c", "vos:ContainerNode")))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_missing_node_is_not_found() {
    let (_dir, state) = new_state().await;
    let router = routes(state);

    let request = Request::builder()
        .method("GET")
        .uri("/vospace/nodes/missing")
        .header("x-vospace-identity", "alice")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_the_node() {
    let (_dir, state) = new_state().await;
    let space = state.store.space_name().to_string();
    let router = routes(state);

    let create = Request::builder()
        .method("PUT")
        .uri("/vospace/nodes/d")
        .header("x-vospace-identity", "alice")
        .body(Body::from(node_xml(&space, "d", "vos:DataNode")))
        .unwrap();
    assert_eq!(router.clone().oneshot(create).await.unwrap().status(), StatusCode::CREATED);

    let delete = Request::builder()
        .method("DELETE")
        .uri("/vospace/nodes/d")
        .header("x-vospace-identity", "alice")
        .body(Body::empty())
        .unwrap();
    assert_eq!(router.clone().oneshot(delete).await.unwrap().status(), StatusCode::NO_CONTENT);

    let get = Request::builder()
        .method("GET")
        .uri("/vospace/nodes/d")
        .header("x-vospace-identity", "alice")
        .body(Body::empty())
        .unwrap();
    assert_eq!(router.oneshot(get).await.unwrap().status(), StatusCode::NOT_FOUND);
}
