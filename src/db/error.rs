//! Database error types.

use thiserror::Error;

use crate::error::VoSpaceError;

/// Errors raised by the metadata store's connection and schema layer.
///
/// Query-level business errors (duplicate node, link cycle, busy node, …)
/// are raised directly as [`crate::error::VoSpaceError`] by
/// [`super::store::MetadataStore`]; this type covers only the connection
/// and raw-SQL failures underneath it.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(#[source] libsql::Error),

    #[error("failed to initialize database schema: {0}")]
    InitializationFailed(String),

    #[error("SQL execution failed: {context}: {source}")]
    SqlExecutionError {
        context: String,
        #[source]
        source: libsql::Error,
    },

    #[error("row decoding failed: {0}")]
    RowDecodingError(String),
}

impl DatabaseError {
    pub fn sql(context: impl Into<String>, source: libsql::Error) -> Self {
        DatabaseError::SqlExecutionError { context: context.into(), source }
    }
}

impl From<DatabaseError> for VoSpaceError {
    fn from(e: DatabaseError) -> Self {
        VoSpaceError::InternalError(e.to_string())
    }
}
