use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use super::*;
use crate::db::MetadataStore;
use crate::engine::TransferEngine;
use crate::error::VoSpaceError;
use crate::identity::Identity;
use crate::model::node::{Node, NodeType};
use crate::model::path::NodePath;
use crate::storage::{Direction, StorageBackend, StorageEndpoint};

#[derive(Debug, Default, Clone, Copy)]
struct EchoBackend;

#[async_trait]
impl StorageBackend for EchoBackend {
    async fn create_storage_node(&self, _node: &Node) -> Result<(), VoSpaceError> {
        Ok(())
    }
    async fn delete_storage_node(&self, _node: &Node) -> Result<(), VoSpaceError> {
        Ok(())
    }
    async fn move_storage_node(
        &self,
        _src_type: NodeType,
        _src_path: &NodePath,
        _dest_type: NodeType,
        _dest_path: &NodePath,
    ) -> Result<(), VoSpaceError> {
        Ok(())
    }
    async fn copy_storage_node(
        &self,
        _src_type: NodeType,
        _src_path: &NodePath,
        _dest_type: NodeType,
        _dest_path: &NodePath,
    ) -> Result<(), VoSpaceError> {
        Ok(())
    }
    async fn get_accept_views(&self, _node: &Node) -> Result<Vec<crate::model::node::View>, VoSpaceError> {
        Ok(Vec::new())
    }
    async fn get_provide_views(&self, _node: &Node) -> Result<Vec<crate::model::node::View>, VoSpaceError> {
        Ok(Vec::new())
    }
    async fn filter_storage_endpoints(
        &self,
        candidates: &[StorageEndpoint],
        _node_type: NodeType,
        _node_path: &NodePath,
        _protocol: &crate::model::transfer::Protocol,
        _direction: Direction,
    ) -> Result<Vec<StorageEndpoint>, VoSpaceError> {
        Ok(candidates.to_vec())
    }
}

async fn new_state(candidates: Vec<StorageEndpoint>) -> (TempDir, AppState) {
    let dir = TempDir::new().unwrap();
    let store = MetadataStore::new(&dir.path().join("vospace.db"), "example.org").await.unwrap();
    let engine = TransferEngine::new(store.clone(), Arc::new(EchoBackend), candidates, Duration::from_millis(50));
    (dir, AppState { store, engine, backend: Arc::new(EchoBackend), directory_limit_cap: 10_000 })
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn synctrans_push_via_query_params_completes_immediately() {
    let endpoint = StorageEndpoint {
        protocol: crate::model::transfer::ProtocolKind::HttpPut,
        endpoint: crate::model::transfer::Endpoint::new("http://store.example/upload"),
    };
    let (_dir, state) = new_state(vec![endpoint]).await;
    state
        .store
        .create(Node::new_empty(NodeType::ContainerNode, NodePath::parse("c").unwrap()).unwrap(), &Identity::new("alice"))
        .await
        .unwrap();
    let router = routes(state);

    let request = Request::builder()
        .method("POST")
        .uri(
            "/vospace/synctrans?TARGET=c%2Ffile&DIRECTION=pushToVoSpace&\
             PROTOCOL=ivo%3A%2F%2Fivoa.net%2Fvospace%2Fcore%23httpput",
        )
        .header("x-vospace-identity", "alice")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert_eq!(text.matches("<protocol").count(), 1);
    assert!(text.contains(r#"uri="ivo://ivoa.net/vospace/core#httpput""#));
    assert!(text.contains("<endpoint>http://store.example/upload</endpoint>"));
}

#[tokio::test]
async fn synctrans_node_to_node_direction_is_rejected() {
    let (_dir, state) = new_state(Vec::new()).await;
    let router = routes(state);

    let request = Request::builder()
        .method("POST")
        .uri("/vospace/synctrans?TARGET=a&DIRECTION=b&PROTOCOL=ivo%3A%2F%2Fivoa.net%2Fvospace%2Fcore%23httpput")
        .header("x-vospace-identity", "alice")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn async_job_lifecycle_create_run_and_observe_phase() {
    let (_dir, state) = new_state(Vec::new()).await;
    state
        .store
        .create(Node::new_empty(NodeType::DataNode, NodePath::parse("d").unwrap()).unwrap(), &Identity::new("alice"))
        .await
        .unwrap();
    let router = routes(state.clone());

    let transfer = crate::model::transfer::Transfer::PullFromSpace {
        target: NodePath::parse("d").unwrap(),
        protocols: Vec::new(),
        view: None,
    };
    let xml = crate::xml::codec::encode_transfer(&transfer, state.store.space_name()).unwrap();

    let create = Request::builder()
        .method("POST")
        .uri("/vospace/transfers")
        .header("x-vospace-identity", "alice")
        .body(Body::from(xml))
        .unwrap();
    let response = router.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_text(response).await;
    let job_id = body
        .split("<jobId>")
        .nth(1)
        .and_then(|s| s.split("</jobId>").next())
        .expect("jobId present in response")
        .to_string();

    let run = Request::builder()
        .method("POST")
        .uri(format!("/vospace/transfers/{job_id}/phase"))
        .header("x-vospace-identity", "alice")
        .body(Body::from("PHASE=RUN"))
        .unwrap();
    assert_eq!(router.clone().oneshot(run).await.unwrap().status(), StatusCode::OK);

    let mut phase = String::new();
    for _ in 0..50 {
        let phase_request = Request::builder()
            .method("GET")
            .uri(format!("/vospace/transfers/{job_id}/phase"))
            .header("x-vospace-identity", "alice")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(phase_request).await.unwrap();
        phase = body_text(response).await;
        if phase == "COMPLETED" || phase == "ERROR" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(phase, "COMPLETED");
}

#[tokio::test]
async fn job_phase_is_hidden_from_other_identities() {
    let (_dir, state) = new_state(Vec::new()).await;
    let router = routes(state.clone());

    let create = Request::builder()
        .method("POST")
        .uri("/vospace/transfers")
        .header("x-vospace-identity", "alice")
        .body(Body::from(
            crate::xml::codec::encode_transfer(
                &crate::model::transfer::Transfer::PullFromSpace {
                    target: NodePath::parse("d").unwrap(),
                    protocols: Vec::new(),
                    view: None,
                },
                state.store.space_name(),
            )
            .unwrap(),
        ))
        .unwrap();
    let response = router.clone().oneshot(create).await.unwrap();
    let body = body_text(response).await;
    let job_id = body.split("<jobId>").nth(1).and_then(|s| s.split("</jobId>").next()).unwrap().to_string();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/vospace/transfers/{job_id}/phase"))
        .header("x-vospace-identity", "bob")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
