//! The typed error taxonomy shared by every layer of this crate.
//!
//! Lower layers (the database connection, the XML codec) keep their own
//! specific error types and chain into this one via `#[from]`, the same
//! way the teacher's `NodeServiceError` chains `DatabaseError`. The
//! dispatcher only ever needs to reason about `VoSpaceError`.

use thiserror::Error;

/// The uniform error taxonomy described in spec §7.
///
/// Each variant carries its own HTTP status via [`VoSpaceError::status_code`].
#[derive(Error, Debug)]
pub enum VoSpaceError {
    /// Bad path, bad property URI, missing attribute, malformed XML.
    #[error("invalid URI: {0}")]
    InvalidUri(String),

    /// Bad query parameter, empty body, a synchronous node-to-node transfer.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Identity absent or unauthorized for the requested operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Lookup miss on a node path.
    #[error("node does not exist: {0}")]
    NodeDoesNotExist(String),

    /// Parent missing on create.
    #[error("container does not exist: {0}")]
    ContainerDoesNotExist(String),

    /// Create on an already-occupied path.
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    /// Traversal through a `LinkNode`.
    #[error("link found: {0}")]
    LinkFound(String),

    /// Mutation attempted on a node with `busy = true`.
    #[error("node is busy: {0}")]
    NodeIsBusy(String),

    /// Illegal phase transition or observation of a job.
    #[error("invalid job state: {0}")]
    InvalidJobStateError(String),

    /// A serialization conflict that survived one automatic retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage backend or database failure.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl VoSpaceError {
    /// The HTTP status code this error surfaces as (spec §7).
    pub fn status_code(&self) -> u16 {
        match self {
            VoSpaceError::InvalidUri(_) => 400,
            VoSpaceError::InvalidArgument(_) => 400,
            VoSpaceError::LinkFound(_) => 400,
            VoSpaceError::InvalidJobStateError(_) => 400,
            VoSpaceError::PermissionDenied(_) => 403,
            VoSpaceError::NodeDoesNotExist(_) => 404,
            VoSpaceError::ContainerDoesNotExist(_) => 404,
            VoSpaceError::DuplicateNode(_) => 409,
            VoSpaceError::NodeIsBusy(_) => 409,
            VoSpaceError::Conflict(_) => 409,
            VoSpaceError::InternalError(_) => 500,
        }
    }
}
