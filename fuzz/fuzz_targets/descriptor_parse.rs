#![no_main]

//! Fuzz target for object XML parsing and placeholder substitution.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use statedump_domain::{parse_object_xml, substitute};
use std::collections::BTreeMap;

#[derive(Debug, Arbitrary)]
struct Input {
    xml: String,
    values: Vec<(String, String)>,
}

fuzz_target!(|input: Input| {
    let values: BTreeMap<String, String> = input.values.into_iter().collect();
    let (text, _unknown) = substitute(&input.xml, &values);

    // Parsing must never panic; a parsed object must fingerprint stably.
    if let Ok(desc) = parse_object_xml("fuzz.xml", &text) {
        assert_eq!(desc.fingerprint(), desc.fingerprint());
        let _ = desc.to_stored();
    }
});
