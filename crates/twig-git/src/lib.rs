//! Git transfer for Twig.
//!
//! This crate implements the client half of the smart HTTP protocol, the
//! pack file format, and delta resolution, which together let Twig clone
//! a repository from a standard git server.

mod clone;
pub mod delta;
mod error;
pub mod pack;
mod pktline;
pub mod transport;
pub mod varint;

pub use clone::{clone_repository, CloneSummary};
pub use delta::{apply_delta, resolve_records, resolve_ref_delta, Delta, DeltaInstruction};
pub use error::GitError;
pub use pack::{PackBuilder, PackDecoder, PackRecord};
pub use pktline::{PktLine, PktLineReader, PktLineWriter};
pub use transport::{
    extract_pack, HttpOptions, HttpTransport, RefAdvertisement, Transport, TransportClient,
};

/// Result type for git transfer operations.
pub type Result<T> = std::result::Result<T, GitError>;
