use async_trait::async_trait;

use crate::error::VoSpaceError;
use crate::model::node::{Node, NodeType, View};
use crate::model::path::NodePath;
use crate::model::transfer::Protocol;

use super::{Direction, StorageBackend, StorageEndpoint};

/// A reference [`StorageBackend`] that performs no byte-level work: every
/// provisioning call is a no-op and every view/endpoint query returns empty.
/// Used by tests and by embedders who only want metadata-store semantics
/// (mirrors the teacher's pattern of registering a default no-op behavior
/// alongside real ones in `behaviors/mod.rs`).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

#[async_trait]
impl StorageBackend for NullBackend {
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

    async fn get_accept_views(&self, _node: &Node) -> Result<Vec<View>, VoSpaceError> {
        Ok(Vec::new())
    }

    async fn get_provide_views(&self, _node: &Node) -> Result<Vec<View>, VoSpaceError> {
        Ok(Vec::new())
    }

    async fn filter_storage_endpoints(
        &self,
        _candidates: &[StorageEndpoint],
        _node_type: NodeType,
        _node_path: &NodePath,
        _protocol: &Protocol,
        _direction: Direction,
    ) -> Result<Vec<StorageEndpoint>, VoSpaceError> {
        Ok(Vec::new())
    }
}
