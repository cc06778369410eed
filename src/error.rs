//! Error types for the form-data encoder.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the form-data encoder.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error outside any part, such as flushing the sink
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A file part could not be opened
    #[error("resource unavailable: {}: {source}", path.display())]
    ResourceUnavailable {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },

    /// Streaming a file part failed, either reading its source or writing to the sink
    #[error("failed to stream part \"{name}\" (filename \"{filename}\"): {source}")]
    PartIo {
        /// Form field name of the failing part.
        name: String,
        /// Filename of the failing part.
        filename: String,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },

    /// Writing the encoded headers or value of a part to the sink failed
    #[error("failed to write part \"{name}\": {source}")]
    FieldIo {
        /// Form field name of the failing part.
        name: String,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },

    /// The source of a file part was already read by an earlier write
    #[error("source of part \"{name}\" (filename \"{filename}\") was already consumed")]
    SourceConsumed {
        /// Form field name of the part.
        name: String,
        /// Filename of the part.
        filename: String,
    },

    /// A part was appended after the closing boundary was written
    #[error("form is finalized; no further parts can be appended")]
    Finalized,

    /// Invalid boundary
    #[error("Invalid boundary: {0}")]
    InvalidBoundary(String),

    /// Operation not supported by a write-only body
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
}

/// Specialized Result type for form-data operations.
pub type Result<T> = std::result::Result<T, Error>;
