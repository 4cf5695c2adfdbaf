//! Delta instruction streams and their resolution against stored bases.
//!
//! A delta payload starts with two size varints (base length, result
//! length) and continues with instructions until it is exhausted:
//!
//! ```text
//! copy:    1 SSS OOOO  [offset bytes] [size bytes]
//! insert:  0 NNNNNNN   [N literal bytes]
//! ```
//!
//! For a copy, each set `O` bit (bit 0 up to bit 3) means one more
//! little-endian offset byte follows, and each set `S` bit (bit 4 up to
//! bit 6) one more size byte; unset bits contribute zero. A size of zero
//! stands for 0x10000. An insert opcode carries its literal length in its
//! low seven bits; `0x00` is reserved.

use crate::pack::PackRecord;
use crate::{varint, GitError, Result};
use twig_storage::{ObjectId, ObjectStore, StorageError};

const COPY: u8 = 0x80;
/// Copy size used when no size bytes are present.
const DEFAULT_COPY_SIZE: u32 = 0x10000;
/// Longest literal a single insert opcode can carry.
const MAX_INSERT: usize = 0x7f;

/// One delta instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaInstruction<'a> {
    /// Append `base[offset..offset + size]`.
    Copy {
        /// Start of the range in the base.
        offset: u32,
        /// Length of the range.
        size: u32,
    },
    /// Append the bytes verbatim.
    Insert(&'a [u8]),
}

/// A parsed delta payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta<'a> {
    /// Declared length of the base object.
    pub base_size: u64,
    /// Declared length of the result.
    pub result_size: u64,
    /// Instructions in order.
    pub instructions: Vec<DeltaInstruction<'a>>,
}

impl<'a> Delta<'a> {
    /// Parses a delta payload.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (base_size, used) = varint::read_size(payload)
            .ok_or_else(|| invalid("truncated base size".to_string()))?;
        let mut rest = &payload[used..];
        let (result_size, used) = varint::read_size(rest)
            .ok_or_else(|| invalid("truncated result size".to_string()))?;
        rest = &rest[used..];

        let mut instructions = Vec::new();
        while let Some((&opcode, tail)) = rest.split_first() {
            let (instruction, tail) = if opcode & COPY != 0 {
                parse_copy(opcode, tail)?
            } else {
                parse_insert(opcode, tail)?
            };
            instructions.push(instruction);
            rest = tail;
        }

        Ok(Self {
            base_size,
            result_size,
            instructions,
        })
    }

    /// Applies the instructions to `base`.
    ///
    /// The declared sizes are informational; disagreement with the actual
    /// lengths is logged and otherwise ignored.
    pub fn apply(&self, base: &[u8]) -> Result<Vec<u8>> {
        if self.base_size != base.len() as u64 {
            tracing::warn!(
                declared = self.base_size,
                actual = base.len(),
                "delta base size disagrees with base object"
            );
        }

        let capacity = usize::try_from(self.result_size).unwrap_or(0).min(1 << 24);
        let mut out = Vec::with_capacity(capacity);
        for instruction in &self.instructions {
            match *instruction {
                DeltaInstruction::Copy { offset, size } => {
                    let start = offset as usize;
                    let end = start + size as usize;
                    let range = base.get(start..end).ok_or_else(|| {
                        invalid(format!(
                            "copy {}..{} outside base of {} bytes",
                            start,
                            end,
                            base.len()
                        ))
                    })?;
                    out.extend_from_slice(range);
                }
                DeltaInstruction::Insert(data) => out.extend_from_slice(data),
            }
        }

        if self.result_size != out.len() as u64 {
            tracing::warn!(
                declared = self.result_size,
                actual = out.len(),
                "delta result size disagrees with output"
            );
        }
        Ok(out)
    }

    /// Serializes the delta payload.
    ///
    /// Copies longer than one opcode can express and inserts longer than
    /// 127 bytes are split across several instructions.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        varint::write_size(&mut out, self.base_size);
        varint::write_size(&mut out, self.result_size);

        for instruction in &self.instructions {
            match *instruction {
                DeltaInstruction::Copy { offset, size } => {
                    let mut offset = u64::from(offset);
                    let mut remaining = size;
                    while remaining > 0 {
                        let chunk = remaining.min(DEFAULT_COPY_SIZE);
                        encode_copy(&mut out, offset, chunk);
                        offset += u64::from(chunk);
                        remaining -= chunk;
                    }
                }
                DeltaInstruction::Insert(data) => {
                    for chunk in data.chunks(MAX_INSERT) {
                        out.push(chunk.len() as u8);
                        out.extend_from_slice(chunk);
                    }
                }
            }
        }
        out
    }
}

/// Decodes the offset and size bytes selected by a copy opcode.
fn parse_copy(opcode: u8, mut rest: &[u8]) -> Result<(DeltaInstruction<'_>, &[u8])> {
    let mut take = |bit: u8, shift: u32| -> Result<u32> {
        if opcode & bit == 0 {
            return Ok(0);
        }
        let (&byte, tail) = rest
            .split_first()
            .ok_or_else(|| invalid("copy instruction truncated".to_string()))?;
        rest = tail;
        Ok(u32::from(byte) << shift)
    };

    // Offset bytes for opcode bits 0..=3, then size bytes for bits 4..=6,
    // each least significant byte first.
    let offset = take(0x01, 0)? | take(0x02, 8)? | take(0x04, 16)? | take(0x08, 24)?;
    let mut size = take(0x10, 0)? | take(0x20, 8)? | take(0x40, 16)?;
    if size == 0 {
        size = DEFAULT_COPY_SIZE;
    }

    Ok((DeltaInstruction::Copy { offset, size }, rest))
}

fn parse_insert(opcode: u8, rest: &[u8]) -> Result<(DeltaInstruction<'_>, &[u8])> {
    let len = usize::from(opcode);
    if len == 0 {
        return Err(invalid("reserved opcode 0x00".to_string()));
    }
    if rest.len() < len {
        return Err(invalid(format!(
            "insert of {} bytes with only {} remaining",
            len,
            rest.len()
        )));
    }
    let (data, rest) = rest.split_at(len);
    Ok((DeltaInstruction::Insert(data), rest))
}

/// Writes one copy opcode. `size` is at most 0x10000.
fn encode_copy(out: &mut Vec<u8>, offset: u64, size: u32) {
    let opcode_at = out.len();
    let mut opcode = COPY;
    out.push(0);

    for i in 0..4 {
        let byte = (offset >> (8 * i)) as u8;
        if byte != 0 {
            opcode |= 1 << i;
            out.push(byte);
        }
    }
    // 0x10000 is written as no size bytes at all.
    let size = if size == DEFAULT_COPY_SIZE { 0 } else { size };
    for i in 0..3 {
        let byte = (size >> (8 * i)) as u8;
        if byte != 0 {
            opcode |= 1 << (4 + i);
            out.push(byte);
        }
    }
    out[opcode_at] = opcode;
}

fn invalid(detail: String) -> GitError {
    GitError::InvalidDelta(detail)
}

/// Applies a delta payload to `base`.
pub fn apply_delta(base: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    Delta::parse(payload)?.apply(base)
}

/// Reconstructs an object from a stored base and a delta, stores it, and
/// returns its id. The result has the base object's kind.
pub fn resolve_ref_delta(store: &ObjectStore, base: &ObjectId, delta: &[u8]) -> Result<ObjectId> {
    let base_object = match store.get(base) {
        Ok(object) => object,
        Err(StorageError::ObjectNotFound(_)) => return Err(GitError::MissingDeltaBase(*base)),
        Err(e) => return Err(e.into()),
    };

    let content = apply_delta(&base_object.data, delta)?;
    let id = store.put(base_object.object_type, &content)?;
    tracing::debug!(id = %id, base = %base, size = content.len(), "resolved delta");
    Ok(id)
}

/// Stores every record in stream order and returns the resulting ids.
///
/// Deltas are resolved against whatever the store holds when they are
/// reached, so each base must either be stored already or appear earlier
/// in `records`. There is no second pass.
pub fn resolve_records(store: &ObjectStore, records: &[PackRecord]) -> Result<Vec<ObjectId>> {
    let mut ids = Vec::with_capacity(records.len());
    let mut deltas = 0usize;

    for record in records {
        let id = match record {
            PackRecord::Object { kind, data } => store.put(*kind, data)?,
            PackRecord::RefDelta { base, delta } => {
                deltas += 1;
                resolve_ref_delta(store, base, delta)?
            }
        };
        ids.push(id);
    }

    tracing::info!(objects = ids.len(), deltas, "stored pack objects");
    Ok(ids)
}
