//! The node taxonomy: a closed sum of six variants sharing a common header.
//!
//! The XML `type` token is the discriminator ([`NodeType`]); dispatch on it
//! selects the concrete [`Node`] variant, mirroring the teacher's
//! behavior-registry dispatch on `node_type` string tags
//! (`behaviors/mod.rs`), generalized here to a closed enum instead of an
//! open trait registry because the VOSpace type set is fixed by the
//! standard.

use crate::error::VoSpaceError;
use crate::model::path::NodePath;
use crate::model::property::{find_duplicate_uri, sort_properties, Property};

/// The six VOSpace node type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Node,
    DataNode,
    UnstructuredDataNode,
    StructuredDataNode,
    ContainerNode,
    LinkNode,
}

impl NodeType {
    /// The canonical `vos:*` XML type token for this variant.
    pub fn xml_tag(&self) -> &'static str {
        match self {
            NodeType::Node => "vos:Node",
            NodeType::DataNode => "vos:DataNode",
            NodeType::UnstructuredDataNode => "vos:UnstructuredDataNode",
            NodeType::StructuredDataNode => "vos:StructuredDataNode",
            NodeType::ContainerNode => "vos:ContainerNode",
            NodeType::LinkNode => "vos:LinkNode",
        }
    }

    /// Parse a `type` attribute value, tolerating both the `vos:`-prefixed
    /// and bare forms on input (encoding always emits the prefixed form).
    pub fn parse(token: &str) -> Result<Self, VoSpaceError> {
        let bare = token.strip_prefix("vos:").unwrap_or(token);
        match bare {
            "Node" => Ok(NodeType::Node),
            "DataNode" => Ok(NodeType::DataNode),
            "UnstructuredDataNode" => Ok(NodeType::UnstructuredDataNode),
            "StructuredDataNode" => Ok(NodeType::StructuredDataNode),
            "ContainerNode" => Ok(NodeType::ContainerNode),
            "LinkNode" => Ok(NodeType::LinkNode),
            other => Err(VoSpaceError::InvalidUri(format!("unknown node type: {other}"))),
        }
    }

    /// Whether this type has `DataNode` fields (accepts/provides/busy).
    pub fn is_data_node(&self) -> bool {
        matches!(
            self,
            NodeType::DataNode
                | NodeType::UnstructuredDataNode
                | NodeType::StructuredDataNode
                | NodeType::ContainerNode
        )
    }

    pub fn is_container(&self) -> bool {
        matches!(self, NodeType::ContainerNode)
    }

    pub fn is_link(&self) -> bool {
        matches!(self, NodeType::LinkNode)
    }
}

/// A view URI: a content representation a data node accepts or provides.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct View {
    pub uri: String,
}

impl View {
    pub fn new(uri: impl Into<String>) -> Self {
        View { uri: uri.into() }
    }
}

/// A protocol-extension capability advertised by a node (spec §3.6).
/// Round-trips through the codec; not interpreted by the store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Capability {
    pub uri: String,
    pub endpoint: Option<String>,
}

/// Fields shared by every node variant.
#[derive(Debug, Clone)]
pub struct NodeHeader {
    pub path: NodePath,
    pub properties: Vec<Property>,
    pub capabilities: Vec<Capability>,
}

impl NodeHeader {
    pub fn new(path: NodePath) -> Self {
        NodeHeader { path, properties: Vec::new(), capabilities: Vec::new() }
    }

    /// Install a property list, sorting it and rejecting duplicate URIs
    /// (spec §3.2: "two properties with the same URI may not coexist").
    pub fn set_properties(&mut self, mut properties: Vec<Property>) -> Result<(), VoSpaceError> {
        sort_properties(&mut properties);
        if let Some(dup) = find_duplicate_uri(&properties) {
            return Err(VoSpaceError::InvalidUri(format!(
                "duplicate property URI: {dup}"
            )));
        }
        self.properties = properties;
        Ok(())
    }
}

/// Fields shared by `DataNode` and its refinements.
#[derive(Debug, Clone, Default)]
pub struct DataNodeFields {
    pub accepts: Vec<View>,
    pub provides: Vec<View>,
    pub busy: bool,
}

/// A header-only reference to a child, as returned by a container listing
/// (spec §4.A: "children are header-only; no recursive expansion").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub path: NodePath,
    pub node_type: NodeType,
    pub busy: bool,
}

/// The closed node variant sum (spec §3.2).
#[derive(Debug, Clone)]
pub enum Node {
    Node(NodeHeader),
    DataNode(NodeHeader, DataNodeFields),
    UnstructuredDataNode(NodeHeader, DataNodeFields),
    StructuredDataNode(NodeHeader, DataNodeFields),
    ContainerNode(NodeHeader, DataNodeFields, Vec<ChildRef>),
    LinkNode(NodeHeader, String),
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Node(_) => NodeType::Node,
            Node::DataNode(..) => NodeType::DataNode,
            Node::UnstructuredDataNode(..) => NodeType::UnstructuredDataNode,
            Node::StructuredDataNode(..) => NodeType::StructuredDataNode,
            Node::ContainerNode(..) => NodeType::ContainerNode,
            Node::LinkNode(..) => NodeType::LinkNode,
        }
    }

    pub fn header(&self) -> &NodeHeader {
        match self {
            Node::Node(h) => h,
            Node::DataNode(h, _)
            | Node::UnstructuredDataNode(h, _)
            | Node::StructuredDataNode(h, _) => h,
            Node::ContainerNode(h, _, _) => h,
            Node::LinkNode(h, _) => h,
        }
    }

    pub fn header_mut(&mut self) -> &mut NodeHeader {
        match self {
            Node::Node(h) => h,
            Node::DataNode(h, _)
            | Node::UnstructuredDataNode(h, _)
            | Node::StructuredDataNode(h, _) => h,
            Node::ContainerNode(h, _, _) => h,
            Node::LinkNode(h, _) => h,
        }
    }

    pub fn path(&self) -> &NodePath {
        &self.header().path
    }

    pub fn properties(&self) -> &[Property] {
        &self.header().properties
    }

    pub fn data_fields(&self) -> Option<&DataNodeFields> {
        match self {
            Node::DataNode(_, d)
            | Node::UnstructuredDataNode(_, d)
            | Node::StructuredDataNode(_, d)
            | Node::ContainerNode(_, d, _) => Some(d),
            _ => None,
        }
    }

    pub fn data_fields_mut(&mut self) -> Option<&mut DataNodeFields> {
        match self {
            Node::DataNode(_, d)
            | Node::UnstructuredDataNode(_, d)
            | Node::StructuredDataNode(_, d)
            | Node::ContainerNode(_, d, _) => Some(d),
            _ => None,
        }
    }

    pub fn busy(&self) -> bool {
        self.data_fields().map(|d| d.busy).unwrap_or(false)
    }

    pub fn set_busy(&mut self, busy: bool) {
        if let Some(d) = self.data_fields_mut() {
            d.busy = busy;
        }
    }

    pub fn children(&self) -> Option<&[ChildRef]> {
        match self {
            Node::ContainerNode(_, _, children) => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<ChildRef>> {
        match self {
            Node::ContainerNode(_, _, children) => Some(children),
            _ => None,
        }
    }

    pub fn link_target(&self) -> Option<&str> {
        match self {
            Node::LinkNode(_, target) => Some(target),
            _ => None,
        }
    }

    /// Construct an empty node of the given type at the given path.
    pub fn new_empty(node_type: NodeType, path: NodePath) -> Result<Self, VoSpaceError> {
        let header = NodeHeader::new(path);
        Ok(match node_type {
            NodeType::Node => Node::Node(header),
            NodeType::DataNode => Node::DataNode(header, DataNodeFields::default()),
            NodeType::UnstructuredDataNode => {
                Node::UnstructuredDataNode(header, DataNodeFields::default())
            }
            NodeType::StructuredDataNode => {
                Node::StructuredDataNode(header, DataNodeFields::default())
            }
            NodeType::ContainerNode => {
                Node::ContainerNode(header, DataNodeFields::default(), Vec::new())
            }
            NodeType::LinkNode => {
                return Err(VoSpaceError::InvalidUri(
                    "LinkNode requires a target".to_string(),
                ))
            }
        })
    }
}

impl PartialEq for Node {
    /// Path, type, sorted properties, and variant-specific fields (spec §8
    /// invariant 4). Properties are compared via `Property`'s own
    /// `(uri, value)`-only equality.
    fn eq(&self, other: &Self) -> bool {
        if self.path() != other.path() || self.node_type() != other.node_type() {
            return false;
        }
        if self.properties() != other.properties() {
            return false;
        }
        match (self, other) {
            (Node::Node(_), Node::Node(_)) => true,
            (Node::DataNode(_, a), Node::DataNode(_, b))
            | (Node::UnstructuredDataNode(_, a), Node::UnstructuredDataNode(_, b))
            | (Node::StructuredDataNode(_, a), Node::StructuredDataNode(_, b)) => {
                a.accepts == b.accepts && a.provides == b.provides
            }
            (Node::ContainerNode(_, a, ca), Node::ContainerNode(_, b, cb)) => {
                a.accepts == b.accepts && a.provides == b.provides && ca == cb
            }
            (Node::LinkNode(_, ta), Node::LinkNode(_, tb)) => ta == tb,
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
