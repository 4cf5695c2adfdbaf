//! Fuzz target for loose object framing and payload parsers.

#![no_main]

use libfuzzer_sys::fuzz_target;
use twig_storage::{compression, object, Commit, Tree};

fuzz_target!(|data: &[u8]| {
    let _ = compression::decompress(data);
    if let Ok((_, payload)) = object::decode(data) {
        let _ = Tree::parse(&payload);
        let _ = Commit::parse(&payload);
    }
});
