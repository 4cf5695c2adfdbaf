//! Tree payloads.
//!
//! A tree payload is a run of `<mode> <name>\0<20-byte id>` entries, sorted
//! by name with directory names compared as if they ended in `/`.

use crate::object::ObjectId;
use crate::{Result, StorageError};
use std::fmt;

/// The mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Regular file (`100644`).
    Regular,
    /// Executable file (`100755`).
    Executable,
    /// Symbolic link (`120000`).
    Symlink,
    /// Subdirectory (`40000`).
    Directory,
    /// Submodule commit (`160000`).
    Submodule,
}

impl EntryMode {
    /// Returns the mode as written in tree payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "100644",
            Self::Executable => "100755",
            Self::Symlink => "120000",
            Self::Directory => "40000",
            Self::Submodule => "160000",
        }
    }

    /// Parses a mode from its tree payload form.
    ///
    /// The zero-padded `040000` spelling some writers emit is accepted for
    /// directories.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "100644" => Ok(Self::Regular),
            "100755" => Ok(Self::Executable),
            "120000" => Ok(Self::Symlink),
            "40000" | "040000" => Ok(Self::Directory),
            "160000" => Ok(Self::Submodule),
            _ => Err(StorageError::MalformedObject(format!(
                "unknown tree entry mode: {}",
                s
            ))),
        }
    }

    /// Returns true for subdirectory entries.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Returns the kind of object the entry points at, as shown by `ls-tree`.
    pub fn object_kind(&self) -> &'static str {
        match self {
            Self::Directory => "tree",
            Self::Submodule => "commit",
            _ => "blob",
        }
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `(mode, name, id)` entry of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Entry mode.
    pub mode: EntryMode,
    /// Path segment, never containing a separator.
    pub name: String,
    /// The blob, tree, or commit the entry refers to.
    pub id: ObjectId,
}

impl TreeEntry {
    /// Creates a new entry.
    pub fn new(mode: EntryMode, name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            id,
        }
    }

    /// The byte string entries are ordered by.
    pub fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.as_bytes().to_vec();
        if self.mode.is_dir() {
            key.push(b'/');
        }
        key
    }
}

/// An ordered list of tree entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Builds a tree, sorting entries into canonical order.
    ///
    /// Names are not checked for uniqueness; callers must not pass two
    /// entries with the same name.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by_key(TreeEntry::sort_key);
        Self { entries }
    }

    /// Returns the entries in order.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Consumes the tree, returning its entries.
    pub fn into_entries(self) -> Vec<TreeEntry> {
        self.entries
    }

    /// Serializes the tree payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        for entry in &self.entries {
            payload.extend_from_slice(entry.mode.as_str().as_bytes());
            payload.push(b' ');
            payload.extend_from_slice(entry.name.as_bytes());
            payload.push(0);
            payload.extend_from_slice(entry.id.as_bytes());
        }
        payload
    }

    /// Parses a tree payload, keeping entries in stored order.
    pub fn parse(mut payload: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();

        while !payload.is_empty() {
            let space = payload
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| malformed("entry without mode separator"))?;
            let mode = std::str::from_utf8(&payload[..space])
                .map_err(|_| malformed("mode is not UTF-8"))?;
            let mode = EntryMode::parse(mode)?;
            payload = &payload[space + 1..];

            let nul = payload
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| malformed("entry without name terminator"))?;
            let name = std::str::from_utf8(&payload[..nul])
                .map_err(|_| malformed("entry name is not UTF-8"))?
                .to_string();
            payload = &payload[nul + 1..];

            if payload.len() < ObjectId::LEN {
                return Err(malformed("entry id truncated"));
            }
            let id = ObjectId::from_slice(&payload[..ObjectId::LEN])?;
            payload = &payload[ObjectId::LEN..];

            entries.push(TreeEntry { mode, name, id });
        }

        Ok(Self { entries })
    }
}

fn malformed(detail: &str) -> StorageError {
    StorageError::MalformedObject(format!("tree: {}", detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> ObjectId {
        ObjectId::from_bytes([byte; 20])
    }

    #[test]
    fn test_file_sorts_before_same_named_directory() {
        let tree = Tree::new(vec![
            TreeEntry::new(EntryMode::Directory, "a", id(1)),
            TreeEntry::new(EntryMode::Regular, "a", id(2)),
        ]);
        let modes: Vec<_> = tree.entries().iter().map(|e| e.mode).collect();
        assert_eq!(modes, vec![EntryMode::Regular, EntryMode::Directory]);
    }

    #[test]
    fn test_directory_suffix_affects_order() {
        // "foo/" sorts after "foo.txt" because '/' (0x2f) > '.' (0x2e),
        // while a plain "foo" would sort first.
        let tree = Tree::new(vec![
            TreeEntry::new(EntryMode::Directory, "foo", id(1)),
            TreeEntry::new(EntryMode::Regular, "foo.txt", id(2)),
            TreeEntry::new(EntryMode::Regular, "bar", id(3)),
        ]);
        let names: Vec<_> = tree.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["bar", "foo.txt", "foo"]);
    }

    #[test]
    fn test_encode_layout() {
        let tree = Tree::new(vec![TreeEntry::new(EntryMode::Regular, "hi.txt", id(0xaa))]);
        let mut expected = b"100644 hi.txt\0".to_vec();
        expected.extend_from_slice(&[0xaa; 20]);
        assert_eq!(tree.encode(), expected);
    }

    #[test]
    fn test_parse_encode_roundtrip() {
        let tree = Tree::new(vec![
            TreeEntry::new(EntryMode::Regular, "README.md", id(1)),
            TreeEntry::new(EntryMode::Directory, "src", id(2)),
            TreeEntry::new(EntryMode::Executable, "run.sh", id(3)),
            TreeEntry::new(EntryMode::Symlink, "link", id(4)),
        ]);
        let parsed = Tree::parse(&tree.encode()).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_parse_empty() {
        assert!(Tree::parse(b"").unwrap().entries().is_empty());
    }

    #[test]
    fn test_parse_id_with_space_and_nul_bytes() {
        // Raw ids may contain 0x20 and 0x00; parsing must rely on the fixed width.
        let mut raw = [0x20u8; 20];
        raw[3] = 0;
        let tree = Tree::new(vec![
            TreeEntry::new(EntryMode::Regular, "a", ObjectId::from_bytes(raw)),
            TreeEntry::new(EntryMode::Regular, "b", id(7)),
        ]);
        assert_eq!(Tree::parse(&tree.encode()).unwrap(), tree);
    }

    #[test]
    fn test_parse_truncated_id() {
        let mut payload = b"100644 a\0".to_vec();
        payload.extend_from_slice(&[1u8; 10]);
        assert!(matches!(
            Tree::parse(&payload),
            Err(StorageError::MalformedObject(_))
        ));
    }

    #[test]
    fn test_parse_unknown_mode() {
        let mut payload = b"777 a\0".to_vec();
        payload.extend_from_slice(&[1u8; 20]);
        assert!(matches!(
            Tree::parse(&payload),
            Err(StorageError::MalformedObject(_))
        ));
    }

    #[test]
    fn test_parse_missing_separator() {
        assert!(Tree::parse(b"100644").is_err());
        assert!(Tree::parse(b"100644 name-without-nul").is_err());
    }

    #[test]
    fn test_mode_parse_padded_directory() {
        assert_eq!(EntryMode::parse("040000").unwrap(), EntryMode::Directory);
        assert_eq!(EntryMode::Directory.as_str(), "40000");
    }

    #[test]
    fn test_mode_object_kind() {
        assert_eq!(EntryMode::Directory.object_kind(), "tree");
        assert_eq!(EntryMode::Regular.object_kind(), "blob");
        assert_eq!(EntryMode::Submodule.object_kind(), "commit");
    }
}
