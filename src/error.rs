//! Error types for reading and writing PAGE documents.

use thiserror::Error;

/// Errors raised while loading, parsing or saving a single document.
///
/// Each variant is fatal for the document it was raised on; batch drivers
/// log it and move on to the next document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The input is not well-formed XML.
    #[error("malformed document: {0}")]
    Malformed(#[from] quick_xml::Error),

    /// A required attribute is absent, e.g. the page width or a line polygon.
    #[error("missing required attribute '{field}' on <{element}>")]
    MissingField {
        element: &'static str,
        field: &'static str,
    },

    /// A required attribute is present but cannot be interpreted.
    #[error("invalid value '{value}' for '{field}' on <{element}>")]
    InvalidValue {
        element: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::events::attributes::AttrError> for DocumentError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        DocumentError::Malformed(err.into())
    }
}

pub type Result<T> = std::result::Result<T, DocumentError>;
