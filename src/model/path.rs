//! Node paths and node URIs.
//!
//! A node path is a slash-separated, normalized sequence of non-empty
//! segments; the root container has the empty path. A node URI is the
//! `vos://<space>!vospace/<path>` wire form of a path.

use std::fmt;

use crate::error::VoSpaceError;

/// A normalized, validated node path.
///
/// Construction is the only place normalization happens: segments are
/// split on `/`, empty segments are dropped (so leading/trailing/duplicate
/// slashes are tolerated), and a bare `.` segment anywhere is rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// The root container's path (empty segment list).
    pub fn root() -> Self {
        NodePath { segments: Vec::new() }
    }

    /// Parse and normalize a path string, rejecting `.` segments.
    pub fn parse(raw: &str) -> Result<Self, VoSpaceError> {
        let segments: Vec<String> = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        for seg in &segments {
            if seg.contains('.') {
                return Err(VoSpaceError::InvalidUri(format!(
                    "invalid character '.' in path segment: {seg}"
                )));
            }
        }
        Ok(NodePath { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The canonical `/`-joined string form (no leading slash, matching the
    /// store's `path` primary key convention).
    pub fn as_str(&self) -> String {
        self.segments.join("/")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The parent path, or `None` if this is the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.segments.is_empty() {
            return None;
        }
        let mut parent = self.segments.clone();
        parent.pop();
        Some(NodePath { segments: parent })
    }

    /// A new path formed by appending `child_name` to this one.
    pub fn child(&self, child_name: &str) -> Result<Self, VoSpaceError> {
        if child_name.is_empty() || child_name.contains('.') {
            return Err(VoSpaceError::InvalidUri(format!(
                "invalid child segment: {child_name}"
            )));
        }
        let mut segments = self.segments.clone();
        segments.push(child_name.to_string());
        Ok(NodePath { segments })
    }

    /// Whether `other` is a strict descendant of `self` (child paths of a
    /// container strictly begin with the container's path followed by one
    /// separator).
    pub fn is_strict_ancestor_of(&self, other: &NodePath) -> bool {
        if self.segments.len() >= other.segments.len() {
            return false;
        }
        self.segments == other.segments[..self.segments.len()]
    }

    /// Whether `other` is this path or a descendant of it.
    pub fn is_self_or_ancestor_of(&self, other: &NodePath) -> bool {
        self == other || self.is_strict_ancestor_of(other)
    }

    /// The strict ancestor paths of this path, root first, not including
    /// the path itself.
    pub fn strict_ancestors(&self) -> Vec<NodePath> {
        let mut out = Vec::new();
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            out.push(parent.clone());
            current = parent;
        }
        out.reverse();
        out
    }

    /// Rewrite a descendant path under a new prefix, used by `move`.
    ///
    /// `self` must be a strict ancestor of (or equal to) `descendant`.
    pub fn rewrite_prefix(&self, descendant: &NodePath, new_prefix: &NodePath) -> NodePath {
        let suffix = &descendant.segments[self.segments.len()..];
        let mut segments = new_prefix.segments.clone();
        segments.extend_from_slice(suffix);
        NodePath { segments }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully-qualified `vos://<space>!vospace/<path>` node URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeUri {
    pub space: String,
    pub path: NodePath,
}

impl NodeUri {
    pub fn new(space: impl Into<String>, path: NodePath) -> Self {
        NodeUri { space: space.into(), path }
    }

    /// Parse a `vos://<space>!vospace/<path>` URI into a path, ignoring the
    /// space component (callers compare paths, not full URIs, per the
    /// "all path comparisons are exact-string after normalization" rule).
    pub fn parse(raw: &str) -> Result<Self, VoSpaceError> {
        let without_scheme = raw
            .strip_prefix("vos://")
            .ok_or_else(|| VoSpaceError::InvalidUri(format!("not a vos:// URI: {raw}")))?;
        let (space, rest) = without_scheme
            .split_once("!vospace")
            .ok_or_else(|| VoSpaceError::InvalidUri(format!("missing !vospace marker: {raw}")))?;
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        let path = NodePath::parse(rest)?;
        Ok(NodeUri { space: space.to_string(), path })
    }

    pub fn to_uri_string(&self) -> String {
        format!("vos://{}!vospace/{}", self.space, self.path.as_str())
    }
}

impl fmt::Display for NodeUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri_string())
    }
}

#[cfg(test)]
#[path = "path_test.rs"]
mod path_test;
