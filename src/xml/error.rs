//! XML codec errors.

use thiserror::Error;

use crate::error::VoSpaceError;

/// Errors raised while decoding or encoding the VOSpace XML dialect.
///
/// All variants surface to the dispatcher as `InvalidUri`/`InvalidArgument`
/// per spec §4.A ("Failure modes").
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Malformed(String),

    #[error("missing required attribute `{attr}` on <{element}>")]
    MissingAttribute { element: &'static str, attr: &'static str },

    #[error("missing required element <{0}>")]
    MissingElement(&'static str),

    #[error(transparent)]
    Model(#[from] VoSpaceError),
}

impl From<quick_xml::Error> for XmlError {
    fn from(e: quick_xml::Error) -> Self {
        XmlError::Malformed(e.to_string())
    }
}

impl From<XmlError> for VoSpaceError {
    fn from(e: XmlError) -> Self {
        match e {
            XmlError::Model(inner) => inner,
            other => VoSpaceError::InvalidUri(other.to_string()),
        }
    }
}
