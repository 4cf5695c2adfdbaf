//! Git transfer error types.

use thiserror::Error;
use twig_storage::{ObjectId, StorageError};

/// Errors that can occur while fetching and unpacking objects.
#[derive(Debug, Error)]
pub enum GitError {
    /// A pack record type that is recognized but not implemented, or unknown.
    #[error("unsupported pack feature: {0}")]
    UnsupportedPackFeature(String),

    /// A ref-delta names a base object that is not in the store.
    #[error("delta base not found: {0}")]
    MissingDeltaBase(ObjectId),

    /// The remote could not be reached or answered with a failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid pack file format.
    #[error("invalid pack file: {0}")]
    InvalidPack(String),

    /// A delta instruction stream that cannot be applied.
    #[error("invalid delta: {0}")]
    InvalidDelta(String),

    /// Invalid pkt-line format.
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    /// The remote answered with something other than the expected protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
