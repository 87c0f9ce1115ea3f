//! Metadata Store (spec §4.B)
//!
//! The transactional node tree: create, directory-listing, update
//! properties, move, copy, delete; link-node traversal. Backed by an
//! embedded libsql database, following the teacher's `db/database.rs`
//! connection-and-schema pattern generalized from a single JSON-property
//! table to the three relational tables in spec §6.

pub mod error;
pub mod schema;
pub mod store;

pub use error::DatabaseError;
pub use store::{Detail, MetadataStore};
