//! Transfers: the client-facing description of bytes or nodes to move.

use crate::error::VoSpaceError;
use crate::model::node::View;
use crate::model::path::{NodePath, NodeUri};

/// One of the four protocol URIs in the closed registry (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProtocolKind {
    HttpPut,
    HttpGet,
    HttpsPut,
    HttpsGet,
}

impl ProtocolKind {
    pub const REGISTRY_PREFIX: &'static str = "ivo://ivoa.net/vospace/core#";

    pub fn uri(&self) -> String {
        let suffix = match self {
            ProtocolKind::HttpPut => "httpput",
            ProtocolKind::HttpGet => "httpget",
            ProtocolKind::HttpsPut => "httpsput",
            ProtocolKind::HttpsGet => "httpsget",
        };
        format!("{}{}", Self::REGISTRY_PREFIX, suffix)
    }

    pub fn parse(uri: &str) -> Result<Self, VoSpaceError> {
        match uri {
            u if u == ProtocolKind::HttpPut.uri() => Ok(ProtocolKind::HttpPut),
            u if u == ProtocolKind::HttpGet.uri() => Ok(ProtocolKind::HttpGet),
            u if u == ProtocolKind::HttpsPut.uri() => Ok(ProtocolKind::HttpsPut),
            u if u == ProtocolKind::HttpsGet.uri() => Ok(ProtocolKind::HttpsGet),
            other => Err(VoSpaceError::InvalidUri(format!("unknown protocol: {other}"))),
        }
    }

    /// The URL scheme a matching endpoint must use.
    pub fn scheme(&self) -> &'static str {
        match self {
            ProtocolKind::HttpPut | ProtocolKind::HttpGet => "http",
            ProtocolKind::HttpsPut | ProtocolKind::HttpsGet => "https",
        }
    }

    /// Whether this protocol uploads bytes into the space (a push target).
    pub fn is_upload(&self) -> bool {
        matches!(self, ProtocolKind::HttpPut | ProtocolKind::HttpsPut)
    }
}

/// A URL produced by the storage backend at which a single transfer may be
/// executed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Endpoint {
    pub url: String,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Endpoint { url: url.into() }
    }
}

/// A protocol entry: the requested transport, optionally paired with a
/// server-assigned endpoint once one has been picked.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Protocol {
    pub kind: ProtocolKind,
    pub endpoint: Option<Endpoint>,
}

impl Protocol {
    pub fn new(kind: ProtocolKind) -> Self {
        Protocol { kind, endpoint: None }
    }

    pub fn with_endpoint(kind: ProtocolKind, endpoint: Endpoint) -> Self {
        Protocol { kind, endpoint: Some(endpoint) }
    }
}

/// A client request to move bytes or nodes (spec §3.4).
#[derive(Debug, Clone)]
pub enum Transfer {
    /// Client uploads bytes into `target`.
    PushToSpace {
        target: NodePath,
        protocols: Vec<Protocol>,
        view: Option<View>,
    },
    /// Client downloads bytes from `target`.
    PullFromSpace {
        target: NodePath,
        protocols: Vec<Protocol>,
        view: Option<View>,
    },
    /// Duplicate `target`'s subtree to `destination`, keeping the source.
    Copy {
        target: NodePath,
        destination: NodePath,
    },
    /// Rename `target`'s subtree to `destination`.
    Move {
        target: NodePath,
        destination: NodePath,
    },
}

impl Transfer {
    pub fn target(&self) -> &NodePath {
        match self {
            Transfer::PushToSpace { target, .. }
            | Transfer::PullFromSpace { target, .. }
            | Transfer::Copy { target, .. }
            | Transfer::Move { target, .. } => target,
        }
    }

    pub fn is_node_transfer(&self) -> bool {
        matches!(self, Transfer::Copy { .. } | Transfer::Move { .. })
    }

    pub fn is_protocol_transfer(&self) -> bool {
        !self.is_node_transfer()
    }

    /// `true` for copy, `false` for move; only meaningful for node transfers.
    pub fn keep_bytes(&self) -> Option<bool> {
        match self {
            Transfer::Copy { .. } => Some(true),
            Transfer::Move { .. } => Some(false),
            _ => None,
        }
    }

    pub fn direction_string(&self) -> String {
        match self {
            Transfer::PushToSpace { .. } => "pushToVoSpace".to_string(),
            Transfer::PullFromSpace { .. } => "pullFromVoSpace".to_string(),
            Transfer::Copy { destination, .. } | Transfer::Move { destination, .. } => {
                destination.as_str()
            }
        }
    }

    /// Build a `Transfer` the way the wire protocol describes one: a
    /// target URI, a direction token, and — for node transfers — whether
    /// to keep the source bytes. Used both by the async-transfer codec and
    /// by the synchronous-transfer query-parameter path.
    pub fn from_parts(
        target: &str,
        direction: &str,
        keep_bytes: Option<bool>,
        protocols: Vec<Protocol>,
        view: Option<View>,
    ) -> Result<Self, VoSpaceError> {
        let target_path = parse_target(target)?;
        match direction {
            "pushToVoSpace" => Ok(Transfer::PushToSpace { target: target_path, protocols, view }),
            "pullFromVoSpace" => Ok(Transfer::PullFromSpace { target: target_path, protocols, view }),
            other => {
                let destination = parse_target(other)?;
                match keep_bytes {
                    Some(true) => Ok(Transfer::Copy { target: target_path, destination }),
                    Some(false) => Ok(Transfer::Move { target: target_path, destination }),
                    None => Err(VoSpaceError::InvalidArgument(
                        "node-to-node transfer requires keepBytes".to_string(),
                    )),
                }
            }
        }
    }
}

/// Accept either a bare path or a full `vos://` URI for transfer endpoints.
fn parse_target(raw: &str) -> Result<NodePath, VoSpaceError> {
    if raw.starts_with("vos://") {
        Ok(NodeUri::parse(raw)?.path)
    } else {
        NodePath::parse(raw)
    }
}

#[cfg(test)]
#[path = "transfer_test.rs"]
mod transfer_test;
