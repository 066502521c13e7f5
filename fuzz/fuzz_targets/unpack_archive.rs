#![no_main]

//! Fuzz target for untrusted archive bytes.
//!
//! Whatever the input, `unpack` must return an error or a scratch directory
//! holding only allowed names, and never write past its byte budget.

use libfuzzer_sys::fuzz_target;
use statedump_unpack::{UnpackOptions, is_allowed_name, unpack};

const BUDGET: u64 = 1 << 20;

fuzz_target!(|data: &[u8]| {
    let opts = UnpackOptions {
        max_total_bytes: BUDGET,
        temp_root: None,
    };
    let Ok(dir) = unpack(data, &opts) else {
        return;
    };

    let mut total = 0u64;
    for name in dir.accepted() {
        assert!(is_allowed_name(name), "accepted disallowed name {name:?}");
        let path = dir.path().join(name);
        let meta = std::fs::metadata(&path).expect("accepted file exists");
        total += meta.len();
    }
    assert!(total <= BUDGET);
    let _ = dir.close();
});
