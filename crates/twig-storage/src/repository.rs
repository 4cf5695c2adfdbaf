//! Repository layout: a work tree with a metadata directory inside it.

use crate::compression::CompressionLevel;
use crate::{ObjectStore, RefStore, Result, StorageError};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the metadata directory inside the work tree.
pub const METADATA_DIR: &str = ".git";

/// Branch HEAD points at in a fresh repository.
pub const DEFAULT_BRANCH: &str = "refs/heads/main";

/// A repository with objects and references.
#[derive(Debug, Clone)]
pub struct Repository {
    work_tree: PathBuf,
    /// Object store.
    pub objects: ObjectStore,
    /// Reference store.
    pub refs: RefStore,
}

impl Repository {
    fn at(work_tree: &Path) -> Self {
        let meta = work_tree.join(METADATA_DIR);
        Self {
            work_tree: work_tree.to_path_buf(),
            objects: ObjectStore::new(meta.join("objects")),
            refs: RefStore::new(meta),
        }
    }

    /// Creates the metadata skeleton under `work_tree`.
    ///
    /// The work tree itself may already exist and hold files; an existing
    /// metadata directory is an error.
    pub fn init(work_tree: impl AsRef<Path>) -> Result<Self> {
        let work_tree = work_tree.as_ref();
        let meta = work_tree.join(METADATA_DIR);
        if meta.exists() {
            return Err(StorageError::AlreadyExists(meta));
        }

        fs::create_dir_all(meta.join("objects"))?;
        fs::create_dir_all(meta.join("refs").join("heads"))?;
        fs::create_dir_all(meta.join("refs").join("tags"))?;

        let repo = Self::at(work_tree);
        repo.refs.set_symbolic("HEAD", DEFAULT_BRANCH)?;

        tracing::info!(path = %work_tree.display(), "initialized repository");
        Ok(repo)
    }

    /// Opens an existing repository whose work tree is `work_tree`.
    pub fn open(work_tree: impl AsRef<Path>) -> Result<Self> {
        let work_tree = work_tree.as_ref();
        if !work_tree.join(METADATA_DIR).join("objects").is_dir() {
            return Err(StorageError::NotARepository(work_tree.to_path_buf()));
        }
        Ok(Self::at(work_tree))
    }

    /// Opens the repository containing `start`, searching its ancestors.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = start.as_ref();
        start
            .ancestors()
            .find(|dir| dir.join(METADATA_DIR).join("objects").is_dir())
            .map(Self::at)
            .ok_or_else(|| StorageError::NotARepository(start.to_path_buf()))
    }

    /// Sets the zlib level used for newly written objects.
    pub fn with_compression(mut self, level: CompressionLevel) -> Self {
        self.objects = self.objects.with_compression(level);
        self
    }

    /// Returns the work tree root.
    pub fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    /// Returns the metadata directory.
    pub fn metadata_dir(&self) -> PathBuf {
        self.work_tree.join(METADATA_DIR)
    }
}
