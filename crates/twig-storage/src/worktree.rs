//! Conversion between directories on disk and tree objects.

use crate::repository::METADATA_DIR;
use crate::tree::{EntryMode, Tree, TreeEntry};
use crate::{ObjectId, ObjectStore, ObjectType, Result, StorageError};
use std::fs;
use std::path::Path;

/// Stores a file or directory and returns the id of the resulting object.
///
/// A file becomes a blob. A directory becomes a tree of its children, built
/// recursively, with the metadata directory left out. Every call reads the
/// filesystem afresh.
pub fn build_tree(store: &ObjectStore, path: &Path) -> Result<ObjectId> {
    if fs::metadata(path)?.is_file() {
        return store.put_blob(&fs::read(path)?);
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == METADATA_DIR {
            continue;
        }
        let name = name.into_string().map_err(|name| {
            StorageError::MalformedObject(format!("file name is not UTF-8: {:?}", name))
        })?;

        let child = entry.path();
        let mode = if fs::metadata(&child)?.is_dir() {
            EntryMode::Directory
        } else {
            EntryMode::Regular
        };
        let id = build_tree(store, &child)?;
        entries.push(TreeEntry::new(mode, name, id));
    }

    let id = store.put(ObjectType::Tree, &Tree::new(entries).encode())?;
    tracing::debug!(id = %id, path = %path.display(), "stored tree");
    Ok(id)
}

/// Writes the contents of a stored tree into `dest`, creating it if needed.
///
/// Only regular files and subdirectories are written; any other entry mode
/// fails with [`StorageError::UnsupportedMode`]. Returns the number of
/// files written.
pub fn materialize(store: &ObjectStore, tree_id: &ObjectId, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest)?;
    let tree = Tree::parse(&store.get_typed(tree_id, ObjectType::Tree)?)?;

    let mut written = 0;
    for entry in tree.entries() {
        check_entry_name(&entry.name)?;
        let path = dest.join(&entry.name);

        match entry.mode {
            EntryMode::Directory => written += materialize(store, &entry.id, &path)?,
            EntryMode::Regular => {
                let content = store.get_typed(&entry.id, ObjectType::Blob)?;
                fs::write(&path, &content)?;
                tracing::trace!(path = %path.display(), size = content.len(), "wrote file");
                written += 1;
            }
            other => return Err(StorageError::UnsupportedMode(other.to_string())),
        }
    }

    Ok(written)
}

/// A tree entry name must be a single path segment that stays inside the
/// destination directory.
fn check_entry_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name == METADATA_DIR
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StorageError::MalformedObject(format!(
            "unsafe tree entry name: {:?}",
            name
        )));
    }
    Ok(())
}
