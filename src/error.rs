//! Error types for catalog loading and image scanning.
//!
//! A pattern that is simply absent from the image is never an error; it just
//! ends the enumeration for that signature. Everything here is either a
//! configuration problem caught before scanning or an I/O failure that makes
//! the whole scan impossible.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CarveError {
    /// A format record is malformed and would produce meaningless or
    /// non-terminating scans.
    #[error("Invalid format descriptor '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },

    /// A filter named a format the catalog does not contain.
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to build worker pool: {0}")]
    Pool(String),
}

impl CarveError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        CarveError::InvalidDescriptor {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type CarveResult<T> = std::result::Result<T, CarveError>;
