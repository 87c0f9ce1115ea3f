//! Model & XML Codec (spec §4.A)
//!
//! Typed node/transfer/property/view/protocol entities live in
//! [`crate::model`]; this module carries the parse/emit side of the
//! VOSpace 2.1 wire dialect, generalized from the teacher's single-format
//! JSON codec to the namespaced XML document described in spec §4.A.

pub mod codec;
pub mod error;

pub use codec::{
    decode_node, decode_transfer, encode_job, encode_node, encode_transfer,
    encode_transfer_details,
};
pub use error::XmlError;
