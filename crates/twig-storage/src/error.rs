//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No object is stored under the requested id.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The on-disk record failed to decompress (bad checksum or truncated stream).
    #[error("corrupt object: {0}")]
    CorruptObject(String),

    /// The decompressed bytes are not a valid `<kind> <len>\0<payload>` frame,
    /// or a payload does not parse as its kind.
    #[error("malformed object: {0}")]
    MalformedObject(String),

    /// A string is not a 40-character hex object id.
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    /// A tree entry mode that cannot be written to a working tree.
    #[error("unsupported tree entry mode: {0}")]
    UnsupportedMode(String),

    /// The requested reference does not exist.
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// A reference file could not be interpreted.
    #[error("invalid ref: {0}")]
    InvalidRef(String),

    /// The directory has no metadata directory.
    #[error("not a twig repository: {}", .0.display())]
    NotARepository(PathBuf),

    /// A repository already exists at the path.
    #[error("repository already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
}
