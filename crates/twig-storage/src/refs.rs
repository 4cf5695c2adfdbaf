//! Reference files.
//!
//! Each ref is a file under the metadata directory named after the ref
//! (`HEAD`, `refs/heads/main`, ...) holding either `"<hash>\n"` or
//! `"ref: <target>\n"`.

use crate::{ObjectId, Result, StorageError};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// Symbolic chains longer than this are treated as a loop.
const MAX_SYMREF_DEPTH: usize = 5;

/// A reference (branch, tag, or symbolic ref).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Direct reference to an object.
    Direct(ObjectId),
    /// Symbolic reference (e.g., HEAD -> refs/heads/main).
    Symbolic(String),
}

impl Reference {
    /// Returns the object ID if this is a direct reference.
    pub fn as_direct(&self) -> Option<ObjectId> {
        match self {
            Self::Direct(id) => Some(*id),
            Self::Symbolic(_) => None,
        }
    }

    fn parse(name: &str, content: &str) -> Result<Self> {
        let content = content.trim_end();
        if let Some(target) = content.strip_prefix("ref:") {
            return Ok(Self::Symbolic(target.trim().to_string()));
        }
        ObjectId::from_hex(content)
            .map(Self::Direct)
            .map_err(|_| StorageError::InvalidRef(format!("{}: {:?}", name, content)))
    }

    fn encode(&self) -> String {
        match self {
            Self::Direct(id) => format!("{}\n", id),
            Self::Symbolic(target) => format!("ref: {}\n", target),
        }
    }
}

/// Reference store backed by files in the metadata directory.
#[derive(Debug, Clone)]
pub struct RefStore {
    root: PathBuf,
}

impl RefStore {
    /// Creates a ref store rooted at the metadata directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns true for `HEAD` and for names under `refs/`.
    ///
    /// Anything else would land elsewhere in the metadata directory, such as
    /// inside `objects/`.
    pub fn is_valid_name(name: &str) -> bool {
        if name == "HEAD" {
            return true;
        }
        let Some(rest) = name.strip_prefix("refs/") else {
            return false;
        };
        !rest.is_empty()
            && Path::new(rest)
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
            && !rest.split('/').any(str::is_empty)
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        if !Self::is_valid_name(name) {
            return Err(StorageError::InvalidRef(format!("invalid ref name: {}", name)));
        }
        Ok(self.root.join(name))
    }

    /// Gets a reference by name.
    pub fn get(&self, name: &str) -> Result<Reference> {
        match fs::read_to_string(self.ref_path(name)?) {
            Ok(content) => Reference::parse(name, &content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::RefNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, name: &str, reference: &Reference) -> Result<()> {
        let path = self.ref_path(name)?;
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(reference.encode().as_bytes())?;
        tmp.persist(&path).map_err(|e| e.error)?;
        tracing::debug!(name, target = ?reference, "wrote ref");
        Ok(())
    }

    /// Points a reference at an object.
    pub fn set(&self, name: &str, target: ObjectId) -> Result<()> {
        self.write(name, &Reference::Direct(target))
    }

    /// Points a reference at another reference.
    pub fn set_symbolic(&self, name: &str, target: &str) -> Result<()> {
        self.write(name, &Reference::Symbolic(target.to_string()))
    }

    /// Follows symbolic references until an object id is reached.
    pub fn resolve(&self, name: &str) -> Result<ObjectId> {
        let mut current = name.to_string();
        for _ in 0..=MAX_SYMREF_DEPTH {
            match self.get(&current)? {
                Reference::Direct(id) => return Ok(id),
                Reference::Symbolic(target) => current = target,
            }
        }
        Err(StorageError::InvalidRef(format!(
            "symbolic ref chain from {} is too deep",
            name
        )))
    }

    /// Resolves HEAD to a commit id.
    pub fn resolve_head(&self) -> Result<ObjectId> {
        self.resolve("HEAD")
    }

    /// Gets the current branch name (if HEAD is symbolic).
    pub fn current_branch(&self) -> Option<String> {
        match self.get("HEAD").ok()? {
            Reference::Symbolic(target) => {
                target.strip_prefix("refs/heads/").map(|s| s.to_string())
            }
            Reference::Direct(_) => None,
        }
    }
}
