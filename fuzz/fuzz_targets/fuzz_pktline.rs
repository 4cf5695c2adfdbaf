//! Fuzz target for pkt-line framing and the parsers built on it.
//!
//! Tests that the reader, ref advertisement parsing, and sideband
//! demultiplexing handle arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use twig_git::{extract_pack, PktLineReader, RefAdvertisement};

fuzz_target!(|data: &[u8]| {
    let mut reader = PktLineReader::new(data);

    // Bounded so crafted input cannot loop forever.
    for _ in 0..100 {
        match reader.read() {
            Ok(Some(_)) => continue,
            Ok(None) | Err(_) => break,
        }
    }

    let _ = RefAdvertisement::parse(data);
    let _ = extract_pack(data);
});
