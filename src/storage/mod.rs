//! Storage Backend Interface (spec §4.E)
//!
//! The abstract contract the transfer engine calls to provision endpoints
//! and to perform data-plane move/copy/delete. Generalizes the teacher's
//! `NodeStore` trait-abstraction pattern (`db/node_store.rs`): an
//! `#[async_trait]` trait with a `Send + Sync` bound so implementations can
//! be shared across the engine's concurrent job tasks, plus a reference
//! no-op implementation for tests and for embedders who only need metadata
//! semantics.

mod null_backend;

use async_trait::async_trait;

use crate::error::VoSpaceError;
use crate::model::node::{Node, NodeType, View};
use crate::model::path::NodePath;
use crate::model::transfer::{Endpoint, Protocol, ProtocolKind};

pub use null_backend::NullBackend;

/// The direction of a protocol transfer, for endpoint filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    PushToSpace,
    PullFromSpace,
}

/// A storage endpoint pre-configured in the embedding deployment, before
/// being filtered down for a specific transfer.
#[derive(Debug, Clone)]
pub struct StorageEndpoint {
    pub protocol: ProtocolKind,
    pub endpoint: Endpoint,
}

/// Capabilities the transfer engine requires of a pluggable storage backend
/// (spec §4.E). All methods may fail; the engine treats failures as
/// [`VoSpaceError::InternalError`] and transitions the owning job to `ERROR`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Post-metadata-commit byte-level allocation for a newly created node.
    async fn create_storage_node(&self, node: &Node) -> Result<(), VoSpaceError>;

    /// Post-metadata-commit byte-level cleanup for a deleted node.
    async fn delete_storage_node(&self, node: &Node) -> Result<(), VoSpaceError>;

    /// Byte-level counterpart of a metadata move.
    async fn move_storage_node(
        &self,
        src_type: NodeType,
        src_path: &NodePath,
        dest_type: NodeType,
        dest_path: &NodePath,
    ) -> Result<(), VoSpaceError>;

    /// Byte-level counterpart of a metadata copy.
    async fn copy_storage_node(
        &self,
        src_type: NodeType,
        src_path: &NodePath,
        dest_type: NodeType,
        dest_path: &NodePath,
    ) -> Result<(), VoSpaceError>;

    /// Content-view descriptions for a max-detail read.
    async fn get_accept_views(&self, node: &Node) -> Result<Vec<View>, VoSpaceError>;
    async fn get_provide_views(&self, node: &Node) -> Result<Vec<View>, VoSpaceError>;

    /// Narrow a list of pre-configured storage endpoints to the ones legal
    /// for this transfer (node type, path, requested protocol, direction).
    async fn filter_storage_endpoints(
        &self,
        candidates: &[StorageEndpoint],
        node_type: NodeType,
        node_path: &NodePath,
        protocol: &Protocol,
        direction: Direction,
    ) -> Result<Vec<StorageEndpoint>, VoSpaceError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
