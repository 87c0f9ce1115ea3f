use super::*;
use crate::model::path::NodePath;

#[test]
fn node_type_parses_prefixed_and_bare() {
    assert_eq!(NodeType::parse("vos:ContainerNode").unwrap(), NodeType::ContainerNode);
    assert_eq!(NodeType::parse("ContainerNode").unwrap(), NodeType::ContainerNode);
}

#[test]
fn node_type_rejects_unknown() {
    assert!(NodeType::parse("vos:Bogus").is_err());
}

#[test]
fn new_empty_link_node_requires_target() {
    let path = NodePath::parse("a").unwrap();
    assert!(Node::new_empty(NodeType::LinkNode, path).is_err());
}

#[test]
fn equality_ignores_read_only_but_checks_value() {
    let path = NodePath::parse("a").unwrap();
    let mut a = Node::new_empty(NodeType::ContainerNode, path.clone()).unwrap();
    let mut b = Node::new_empty(NodeType::ContainerNode, path).unwrap();
    a.header_mut()
        .set_properties(vec![Property::new("ivo://x#t", "v", true)])
        .unwrap();
    b.header_mut()
        .set_properties(vec![Property::new("ivo://x#t", "v", false)])
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn equality_checks_children_for_containers() {
    let path = NodePath::parse("a").unwrap();
    let mut a = Node::new_empty(NodeType::ContainerNode, path.clone()).unwrap();
    let b = Node::new_empty(NodeType::ContainerNode, path.clone()).unwrap();
    a.children_mut().unwrap().push(ChildRef {
        path: path.child("x").unwrap(),
        node_type: NodeType::DataNode,
        busy: false,
    });
    assert_ne!(a, b);
}

#[test]
fn busy_defaults_false_and_only_applies_to_data_nodes() {
    let path = NodePath::parse("a").unwrap();
    let plain = Node::new_empty(NodeType::Node, path.clone()).unwrap();
    assert!(!plain.busy());

    let mut data = Node::new_empty(NodeType::DataNode, path).unwrap();
    assert!(!data.busy());
    data.set_busy(true);
    assert!(data.busy());
}

#[test]
fn duplicate_property_uri_rejected() {
    let path = NodePath::parse("a").unwrap();
    let mut node = Node::new_empty(NodeType::Node, path).unwrap();
    let err = node
        .header_mut()
        .set_properties(vec![
            Property::new("ivo://x#a", "1", true),
            Property::new("ivo://x#a", "2", true),
        ])
        .unwrap_err();
    assert!(matches!(err, VoSpaceError::InvalidUri(_)));
}
