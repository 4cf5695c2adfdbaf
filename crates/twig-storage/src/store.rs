//! Content-addressed object store on disk.
//!
//! Objects live at `objects/<hash[0:2]>/<hash[2:]>`, each file holding the
//! zlib-compressed frame of one object. Identical content maps to the
//! identical path, so storing twice is a no-op.

use crate::compression::{self, CompressionLevel};
use crate::object::{self, GitObject, ObjectId, ObjectType};
use crate::{Result, StorageError};
use bytes::Bytes;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Content-addressed object store rooted at an `objects` directory.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    compression: CompressionLevel,
}

impl ObjectStore {
    /// Creates a store over an existing or yet-to-be-created `objects` directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            compression: CompressionLevel::default(),
        }
    }

    /// Sets the zlib level used for newly written objects.
    pub fn with_compression(mut self, level: CompressionLevel) -> Self {
        self.compression = level;
        self
    }

    /// Returns the `objects` directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path an object is (or would be) stored at.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.fanout_dir(id).join(&hex[2..])
    }

    fn fanout_dir(&self, id: &ObjectId) -> PathBuf {
        self.root.join(&id.to_hex()[..2])
    }

    /// Checks if an object exists.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    /// Stores a payload under its content hash and returns the hash.
    ///
    /// The record is written to a temporary file beside its final path and
    /// renamed into place, so a crash never leaves a partial record under
    /// an object's name.
    pub fn put(&self, object_type: ObjectType, payload: &[u8]) -> Result<ObjectId> {
        let (id, framed) = object::encode(object_type, payload);
        let path = self.object_path(&id);

        if path.is_file() {
            tracing::trace!(id = %id, "object already stored");
            return Ok(id);
        }

        let dir = self.fanout_dir(&id);
        fs::create_dir_all(&dir)?;

        let record = compression::compress(&framed, self.compression)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&record)?;
        // A concurrent writer of the same id carries identical bytes, so
        // replacing its file is harmless.
        tmp.persist(&path).map_err(|e| e.error)?;

        tracing::debug!(id = %id, kind = %object_type, size = payload.len(), "stored object");
        Ok(id)
    }

    /// Stores a blob and returns its ID.
    pub fn put_blob(&self, content: &[u8]) -> Result<ObjectId> {
        self.put(ObjectType::Blob, content)
    }

    /// Retrieves an object by ID.
    pub fn get(&self, id: &ObjectId) -> Result<GitObject> {
        let record = match fs::read(self.object_path(id)) {
            Ok(record) => record,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::ObjectNotFound(id.to_hex()))
            }
            Err(e) => return Err(e.into()),
        };

        let framed = compression::decompress(&record)?;
        let (object_type, data) = object::decode(&framed)?;

        Ok(GitObject {
            id: *id,
            object_type,
            data,
        })
    }

    /// Retrieves an object and checks it has the expected kind.
    pub fn get_typed(&self, id: &ObjectId, expected: ObjectType) -> Result<Bytes> {
        let object = self.get(id)?;
        if object.object_type != expected {
            return Err(StorageError::MalformedObject(format!(
                "{} is a {}, expected a {}",
                id, object.object_type, expected
            )));
        }
        Ok(object.data)
    }

    /// Lists all stored object IDs, sorted.
    pub fn list_objects(&self) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::new();
        let fanout = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };

        for dir in fanout {
            let dir = dir?;
            let prefix = dir.file_name().to_string_lossy().into_owned();
            if prefix.len() != 2 || !dir.file_type()?.is_dir() {
                continue;
            }
            for file in fs::read_dir(dir.path())? {
                let rest = file?.file_name().to_string_lossy().into_owned();
                // Leftover temporary files from an interrupted write are skipped.
                if let Ok(id) = ObjectId::from_hex(&format!("{prefix}{rest}")) {
                    ids.push(id);
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Returns the number of objects in the store.
    pub fn len(&self) -> Result<usize> {
        Ok(self.list_objects()?.len())
    }

    /// Returns true if the store holds no objects.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
