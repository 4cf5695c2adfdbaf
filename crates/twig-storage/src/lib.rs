//! Object storage for Twig.
//!
//! This crate provides the content-addressed object store (blobs, trees,
//! commits, tags) kept on disk under a repository's metadata directory,
//! the payload formats of trees and commits, reference files, and the
//! conversion between work-tree directories and tree objects.

mod commit;
pub mod compression;
mod error;
pub mod object;
mod refs;
mod repository;
mod store;
mod tree;
mod worktree;

pub use commit::{Commit, CommitMetadata, Signature};
pub use compression::CompressionLevel;
pub use error::StorageError;
pub use object::{GitObject, ObjectId, ObjectType};
pub use refs::{RefStore, Reference};
pub use repository::{Repository, DEFAULT_BRANCH, METADATA_DIR};
pub use store::ObjectStore;
pub use tree::{EntryMode, Tree, TreeEntry};
pub use worktree::{build_tree, materialize};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
