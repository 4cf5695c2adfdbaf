//! Fuzz target for pack file decoding.
//!
//! Tests that the pack decoder handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use twig_git::PackDecoder;

fuzz_target!(|data: &[u8]| {
    let _ = PackDecoder::new(data).decode();
});
