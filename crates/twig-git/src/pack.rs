//! Git pack file format.
//!
//! A pack is a 12-byte header (`PACK`, version, object count, all
//! big-endian) followed by that many records and, normally, a SHA-1 of
//! everything before it. Each record is a type+size header (see
//! [`crate::varint`]) and a zlib stream; ref-delta records put the 20-byte
//! base id between the two.
//! See: https://git-scm.com/docs/pack-format

use crate::{varint, GitError, Result};
use sha1::{Digest, Sha1};
use twig_storage::compression::{self, CompressionLevel};
use twig_storage::{ObjectId, ObjectStore, ObjectType};

/// Magic bytes at the start of a pack file.
const PACK_SIGNATURE: &[u8; 4] = b"PACK";
/// Pack versions we read. Version 3 only differs in what writers may emit.
const SUPPORTED_VERSIONS: [u32; 2] = [2, 3];
/// Version written by [`PackBuilder`].
const PACK_VERSION: u32 = 2;
const HEADER_LEN: usize = 12;
const TRAILER_LEN: usize = 20;

/// Record type tag for an offset delta.
pub const OFS_DELTA: u8 = 6;
/// Record type tag for a reference delta.
pub const REF_DELTA: u8 = 7;

/// One decoded pack record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackRecord {
    /// A complete object.
    Object {
        /// Object kind.
        kind: ObjectType,
        /// Inflated payload.
        data: Vec<u8>,
    },
    /// An object stored as edits against another object.
    RefDelta {
        /// Id of the object the delta applies to.
        base: ObjectId,
        /// Inflated delta instruction stream.
        delta: Vec<u8>,
    },
}

/// Decodes a pack stream into records.
pub struct PackDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PackDecoder<'a> {
    /// Creates a new pack decoder.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decodes every record in stream order and checks the trailer.
    pub fn decode(mut self) -> Result<Vec<PackRecord>> {
        let count = self.read_header()?;

        // The count is untrusted; let the vector grow past this if needed.
        let mut records = Vec::with_capacity(count.min(4096));
        for index in 0..count {
            records.push(self.read_record(index)?);
        }

        self.verify_trailer()?;
        tracing::debug!(records = records.len(), bytes = self.data.len(), "decoded pack");
        Ok(records)
    }

    fn read_header(&mut self) -> Result<usize> {
        if self.data.len() < HEADER_LEN {
            return Err(GitError::InvalidPack(format!(
                "pack too small: {} bytes",
                self.data.len()
            )));
        }
        if &self.data[0..4] != PACK_SIGNATURE {
            return Err(GitError::InvalidPack("invalid signature".to_string()));
        }

        let version = u32::from_be_bytes([self.data[4], self.data[5], self.data[6], self.data[7]]);
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(GitError::InvalidPack(format!(
                "unsupported version: {}",
                version
            )));
        }

        let count =
            u32::from_be_bytes([self.data[8], self.data[9], self.data[10], self.data[11]]) as usize;
        self.pos = HEADER_LEN;
        Ok(count)
    }

    fn read_record(&mut self, index: usize) -> Result<PackRecord> {
        let offset = self.pos;
        let (code, size, used) = varint::read_type_and_size(&self.data[offset..])
            .ok_or_else(|| {
                GitError::InvalidPack(format!(
                    "truncated header for object {} at offset {}",
                    index, offset
                ))
            })?;
        self.pos += used;

        if let Some(kind) = ObjectType::from_pack_type(code) {
            let data = self.inflate(offset, size)?;
            tracing::trace!(offset, kind = %kind, size = data.len(), "pack object");
            return Ok(PackRecord::Object { kind, data });
        }

        match code {
            REF_DELTA => {
                let end = self.pos + ObjectId::LEN;
                if end > self.data.len() {
                    return Err(GitError::InvalidPack(format!(
                        "truncated delta base id at offset {}",
                        offset
                    )));
                }
                let base = ObjectId::from_slice(&self.data[self.pos..end])?;
                self.pos = end;
                let delta = self.inflate(offset, size)?;
                tracing::trace!(offset, base = %base, size = delta.len(), "pack ref-delta");
                Ok(PackRecord::RefDelta { base, delta })
            }
            OFS_DELTA => Err(GitError::UnsupportedPackFeature(format!(
                "offset delta at offset {}",
                offset
            ))),
            other => Err(GitError::UnsupportedPackFeature(format!(
                "object type {} at offset {}",
                other, offset
            ))),
        }
    }

    /// Inflates the zlib stream at the cursor and moves past it.
    fn inflate(&mut self, offset: usize, declared: u64) -> Result<Vec<u8>> {
        let hint = usize::try_from(declared).unwrap_or(usize::MAX);
        let (data, consumed) = compression::inflate(&self.data[self.pos..], hint)
            .map_err(|e| GitError::InvalidPack(format!("object at offset {}: {}", offset, e)))?;
        self.pos += consumed;

        if data.len() as u64 != declared {
            tracing::warn!(
                offset,
                declared,
                actual = data.len(),
                "pack record size disagrees with its header"
            );
        }
        Ok(data)
    }

    fn verify_trailer(&self) -> Result<()> {
        let rest = self.data.len() - self.pos;
        if rest < TRAILER_LEN {
            if rest > 0 {
                tracing::warn!(bytes = rest, "ignoring bytes after last pack record");
            }
            return Ok(());
        }

        let expected = &self.data[self.pos..self.pos + TRAILER_LEN];
        let computed = Sha1::digest(&self.data[..self.pos]);
        if computed.as_slice() != expected {
            return Err(GitError::InvalidPack("checksum mismatch".to_string()));
        }
        if rest > TRAILER_LEN {
            tracing::warn!(bytes = rest - TRAILER_LEN, "ignoring bytes after pack trailer");
        }
        Ok(())
    }
}

/// Builds a pack file from literal objects and ref-deltas.
pub struct PackBuilder {
    records: Vec<PackRecord>,
}

impl PackBuilder {
    /// Creates a new pack builder.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Adds a complete object.
    pub fn add_object(&mut self, kind: ObjectType, data: impl Into<Vec<u8>>) -> &mut Self {
        self.records.push(PackRecord::Object {
            kind,
            data: data.into(),
        });
        self
    }

    /// Adds a delta against `base`.
    pub fn add_ref_delta(&mut self, base: ObjectId, delta: impl Into<Vec<u8>>) -> &mut Self {
        self.records.push(PackRecord::RefDelta {
            base,
            delta: delta.into(),
        });
        self
    }

    /// Adds an object from the store by ID.
    pub fn add_from_store(&mut self, store: &ObjectStore, id: &ObjectId) -> Result<&mut Self> {
        let object = store.get(id)?;
        Ok(self.add_object(object.object_type, object.data.to_vec()))
    }

    /// Builds the pack file, trailer included.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut pack = Vec::new();

        pack.extend_from_slice(PACK_SIGNATURE);
        pack.extend_from_slice(&PACK_VERSION.to_be_bytes());
        let count = u32::try_from(self.records.len())
            .map_err(|_| GitError::InvalidPack("too many objects for one pack".to_string()))?;
        pack.extend_from_slice(&count.to_be_bytes());

        for record in &self.records {
            match record {
                PackRecord::Object { kind, data } => {
                    varint::write_type_and_size(&mut pack, kind.pack_type(), data.len() as u64);
                    pack.extend(compression::compress(data, CompressionLevel::Default)?);
                }
                PackRecord::RefDelta { base, delta } => {
                    varint::write_type_and_size(&mut pack, REF_DELTA, delta.len() as u64);
                    pack.extend_from_slice(base.as_bytes());
                    pack.extend(compression::compress(delta, CompressionLevel::Default)?);
                }
            }
        }

        let checksum = Sha1::digest(&pack);
        pack.extend_from_slice(&checksum);
        Ok(pack)
    }
}

impl Default for PackBuilder {
    fn default() -> Self {
        Self::new()
    }
}
