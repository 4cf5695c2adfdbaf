//! Variable-length integers used by pack streams and delta payloads.
//!
//! Both encodings store the value least-significant group first. The high
//! bit of every byte is a continuation flag: set means another byte
//! follows. They differ only in the first byte:
//!
//! ```text
//! pack record header      delta size
//! byte 0:  C TTT SSSS     byte 0:  C SSSSSSS
//! byte n:  C SSSSSSS      byte n:  C SSSSSSS
//! ```
//!
//! `C` is the continuation flag, `T` the 3-bit record type, and `S` size
//! bits. The readers return `None` when the input ends while the
//! continuation flag is still set, or when the value would not fit in 64
//! bits.

const CONTINUE: u8 = 0x80;
const LOW_7: u8 = 0x7f;

/// Reads a pack record header from the front of `input`.
///
/// Returns the 3-bit type tag, the inflated size, and the number of bytes
/// the header occupied.
pub fn read_type_and_size(input: &[u8]) -> Option<(u8, u64, usize)> {
    let first = *input.first()?;
    let kind = (first >> 4) & 0b0111;
    let low = u64::from(first & 0b1111);

    if first & CONTINUE == 0 {
        return Some((kind, low, 1));
    }
    let (high, used) = read_groups(&input[1..], 4)?;
    Some((kind, low | high, 1 + used))
}

/// Reads a delta size (7 bits per byte) from the front of `input`.
///
/// Returns the value and the number of bytes it occupied.
pub fn read_size(input: &[u8]) -> Option<(u64, usize)> {
    read_groups(input, 0)
}

/// Accumulates 7-bit groups starting at bit `shift` until a byte without
/// the continuation flag.
fn read_groups(input: &[u8], mut shift: u32) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in input.iter().enumerate() {
        if shift >= u64::BITS {
            return None;
        }
        value |= u64::from(byte & LOW_7) << shift;
        shift += 7;
        if byte & CONTINUE == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Appends a pack record header for a record of `kind` and inflated `size`.
pub fn write_type_and_size(out: &mut Vec<u8>, kind: u8, size: u64) {
    let mut first = ((kind & 0b0111) << 4) | (size & 0b1111) as u8;
    let rest = size >> 4;
    if rest == 0 {
        out.push(first);
        return;
    }
    first |= CONTINUE;
    out.push(first);
    write_size(out, rest);
}

/// Appends a delta size.
pub fn write_size(out: &mut Vec<u8>, mut size: u64) {
    loop {
        let byte = (size & u64::from(LOW_7)) as u8;
        size >>= 7;
        if size == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | CONTINUE);
    }
}
