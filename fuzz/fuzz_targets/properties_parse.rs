#![no_main]

//! Fuzz target for `replacements.properties` / `overrides.properties` text.

use libfuzzer_sys::fuzz_target;
use statedump_domain::{Overrides, parse_properties};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(map) = parse_properties(s) {
        for key in map.keys() {
            assert!(!key.is_empty());
        }
    }
    let _ = Overrides::parse(s);
});
