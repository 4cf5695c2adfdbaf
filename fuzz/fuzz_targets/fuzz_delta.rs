//! Fuzz target for delta application.
//!
//! The first input byte chooses how much of the rest is the base; the
//! remainder is the delta payload.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(rest.len());
    let (base, delta) = rest.split_at(split);

    if let Ok(result) = twig_git::apply_delta(base, delta) {
        let parsed = twig_git::Delta::parse(delta).expect("applied delta must parse");
        assert_eq!(parsed.apply(base).expect("applied delta must re-apply"), result);
    }
});
