use super::*;
use crate::model::path::NodePath;

#[tokio::test]
async fn null_backend_is_a_no_op() {
    let backend = NullBackend;
    let node = Node::new_empty(NodeType::DataNode, NodePath::parse("a").unwrap()).unwrap();

    backend.create_storage_node(&node).await.unwrap();
    backend.delete_storage_node(&node).await.unwrap();
    assert!(backend.get_accept_views(&node).await.unwrap().is_empty());
    assert!(backend.get_provide_views(&node).await.unwrap().is_empty());

    let filtered = backend
        .filter_storage_endpoints(
            &[],
            NodeType::DataNode,
            &NodePath::parse("a").unwrap(),
            &Protocol::new(ProtocolKind::HttpPut),
            Direction::PushToSpace,
        )
        .await
        .unwrap();
    assert!(filtered.is_empty());
}
