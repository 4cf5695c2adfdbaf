//! Object identifiers, kinds, and the canonical object frame.
//!
//! Every object is hashed and stored as `"<kind> <len>\0<payload>"`. The
//! id is the SHA-1 of that frame, never of the bare payload.

use crate::{Result, StorageError};
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// A 20-byte SHA-1 object identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 20]);

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ObjectId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl ObjectId {
    /// Length of a raw id in bytes.
    pub const LEN: usize = 20;

    /// Creates an ObjectId from raw bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Creates an ObjectId from a slice that must be exactly 20 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 20] = bytes.try_into().map_err(|_| {
            StorageError::InvalidObjectId(format!("expected 20 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Creates an ObjectId from a hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() != 40 {
            return Err(StorageError::InvalidObjectId(format!(
                "invalid object id length: {}",
                hex.len()
            )));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex, &mut bytes)
            .map_err(|e| StorageError::InvalidObjectId(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns the lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Computes the id of a payload framed with its kind header.
    pub fn hash_object(object_type: ObjectType, data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(header(object_type, data.len()));
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl FromStr for ObjectId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// File content.
    Blob,
    /// Directory listing.
    Tree,
    /// Commit object.
    Commit,
    /// Annotated tag.
    Tag,
}

impl ObjectType {
    /// Returns the name used in object headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }

    /// Parses an object kind from its header name.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(Self::Blob),
            "tree" => Ok(Self::Tree),
            "commit" => Ok(Self::Commit),
            "tag" => Ok(Self::Tag),
            _ => Err(StorageError::MalformedObject(format!(
                "unknown object type: {}",
                s
            ))),
        }
    }

    /// Returns the type code used in pack files.
    pub fn pack_type(&self) -> u8 {
        match self {
            Self::Commit => 1,
            Self::Tree => 2,
            Self::Blob => 3,
            Self::Tag => 4,
        }
    }

    /// Maps a pack type code to a literal object kind.
    ///
    /// Delta codes (6 and 7) and unassigned codes are not object kinds and
    /// return `None`.
    pub fn from_pack_type(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Commit),
            2 => Some(Self::Tree),
            3 => Some(Self::Blob),
            4 => Some(Self::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn header(object_type: ObjectType, len: usize) -> Vec<u8> {
    format!("{} {}\0", object_type.as_str(), len).into_bytes()
}

/// Frames a payload and computes its id.
///
/// Returns the id together with the framed bytes it was computed over.
pub fn encode(object_type: ObjectType, payload: &[u8]) -> (ObjectId, Vec<u8>) {
    let mut framed = header(object_type, payload.len());
    framed.extend_from_slice(payload);
    let id = ObjectId(Sha1::digest(&framed).into());
    (id, framed)
}

/// Splits a framed object into its kind and payload.
///
/// The length in the header is advisory: a disagreement with the actual
/// payload length is logged, not rejected.
pub fn decode(framed: &[u8]) -> Result<(ObjectType, Bytes)> {
    let nul = framed
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| StorageError::MalformedObject("missing NUL in header".to_string()))?;

    let header = std::str::from_utf8(&framed[..nul])
        .map_err(|_| StorageError::MalformedObject("header is not UTF-8".to_string()))?;
    let (kind, len) = header
        .split_once(' ')
        .ok_or_else(|| StorageError::MalformedObject(format!("invalid header: {}", header)))?;

    let object_type = ObjectType::parse(kind)?;
    let payload = Bytes::copy_from_slice(&framed[nul + 1..]);

    match len.parse::<usize>() {
        Ok(declared) if declared == payload.len() => {}
        Ok(declared) => tracing::warn!(
            kind = %object_type,
            declared,
            actual = payload.len(),
            "object header length disagrees with payload"
        ),
        Err(_) => tracing::warn!(kind = %object_type, len, "unparseable object header length"),
    }

    Ok((object_type, payload))
}

/// An object (blob, tree, commit, or tag) with its computed id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitObject {
    /// The object's identifier (SHA-1 of the framed bytes).
    pub id: ObjectId,
    /// The kind of object.
    pub object_type: ObjectType,
    /// The raw payload, without the header.
    pub data: Bytes,
}

impl GitObject {
    /// Creates a new object, computing its id from the data.
    pub fn new(object_type: ObjectType, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let id = ObjectId::hash_object(object_type, &data);
        Self {
            id,
            object_type,
            data,
        }
    }

    /// Creates a blob object from file content.
    pub fn blob(content: impl Into<Bytes>) -> Self {
        Self::new(ObjectType::Blob, content)
    }

    /// Returns the size of the payload.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_hex_roundtrip() {
        let hex = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";
        let id = ObjectId::from_hex(hex).unwrap();
        assert_eq!(id.to_hex(), hex);
        assert_eq!(hex.parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn test_blob_hash() {
        let obj = GitObject::blob(b"hello\n".to_vec());
        assert_eq!(obj.id.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
    }

    #[test]
    fn test_encode_hashes_framed_bytes() {
        let (id, framed) = encode(ObjectType::Blob, b"hello\n");
        assert_eq!(framed, b"blob 6\0hello\n");

        let independent: [u8; 20] = Sha1::digest(b"blob 6\0hello\n").into();
        assert_eq!(id, ObjectId::from_bytes(independent));
        assert!(id.to_hex().starts_with("ce013625030ba8dba906f756967f9e9ca394464"));
    }

    #[test]
    fn test_encode_matches_hash_object() {
        let (id, _) = encode(ObjectType::Tree, b"tree data");
        assert_eq!(id, ObjectId::hash_object(ObjectType::Tree, b"tree data"));
    }

    #[test]
    fn test_decode_roundtrip() {
        let (_, framed) = encode(ObjectType::Commit, b"tree abc\n\nmsg\n");
        let (kind, payload) = decode(&framed).unwrap();
        assert_eq!(kind, ObjectType::Commit);
        assert_eq!(payload.as_ref(), b"tree abc\n\nmsg\n");
    }

    #[test]
    fn test_decode_payload_with_nul_bytes() {
        let (_, framed) = encode(ObjectType::Blob, b"a\0b\0c");
        let (_, payload) = decode(&framed).unwrap();
        assert_eq!(payload.as_ref(), b"a\0b\0c");
    }

    #[test]
    fn test_decode_missing_nul() {
        let result = decode(b"blob 5 hello");
        assert!(matches!(result, Err(StorageError::MalformedObject(_))));
    }

    #[test]
    fn test_decode_unknown_kind() {
        let result = decode(b"widget 3\0abc");
        assert!(matches!(result, Err(StorageError::MalformedObject(_))));
    }

    #[test]
    fn test_decode_header_without_length() {
        let result = decode(b"blob\0abc");
        assert!(matches!(result, Err(StorageError::MalformedObject(_))));
    }

    #[test]
    fn test_decode_tolerates_wrong_length() {
        let (kind, payload) = decode(b"blob 99\0abc").unwrap();
        assert_eq!(kind, ObjectType::Blob);
        assert_eq!(payload.as_ref(), b"abc");
    }

    #[test]
    fn test_object_type_roundtrip() {
        for ot in [
            ObjectType::Blob,
            ObjectType::Tree,
            ObjectType::Commit,
            ObjectType::Tag,
        ] {
            assert_eq!(ObjectType::parse(ot.as_str()).unwrap(), ot);
            assert_eq!(ObjectType::from_pack_type(ot.pack_type()), Some(ot));
        }
    }

    #[test]
    fn test_object_type_from_pack_type_non_literal() {
        assert_eq!(ObjectType::from_pack_type(0), None);
        assert_eq!(ObjectType::from_pack_type(5), None);
        assert_eq!(ObjectType::from_pack_type(6), None);
        assert_eq!(ObjectType::from_pack_type(7), None);
    }

    #[test]
    fn test_object_id_from_slice() {
        let id = ObjectId::from_slice(&[0xab; 20]).unwrap();
        assert_eq!(*id.as_bytes(), [0xab; 20]);
        assert!(ObjectId::from_slice(&[0u8; 19]).is_err());
    }

    #[test]
    fn test_object_id_invalid_hex() {
        assert!(ObjectId::from_hex("abc").is_err());
        assert!(ObjectId::from_hex("a94a8fe5ccb19ba61c4c0873d391e987982fbbd3ff").is_err());
        assert!(ObjectId::from_hex("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz").is_err());
    }

    #[test]
    fn test_object_id_display_and_debug() {
        let id = ObjectId::from_bytes([0u8; 20]);
        assert_eq!(format!("{}", id), "0".repeat(40));
        assert!(format!("{:?}", id).contains("ObjectId"));
    }

    #[test]
    fn test_object_id_serialization() {
        let id = ObjectId::from_bytes([0xab; 20]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(20)));
        let parsed: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_git_object_empty_blob() {
        let obj = GitObject::blob(b"".to_vec());
        assert_eq!(obj.size(), 0);
        assert_eq!(obj.id.to_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }
}
