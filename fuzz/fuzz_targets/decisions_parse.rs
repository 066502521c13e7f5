#![no_main]

//! Fuzz target for decisions.json parsing.

use libfuzzer_sys::fuzz_target;
use statedump_types::{Decisions, ImportPlan};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(decisions) = serde_json::from_str::<Decisions>(s) {
        let _ = serde_json::to_string(&decisions);
    }
    if let Ok(plan) = serde_json::from_str::<ImportPlan>(s) {
        let decisions = Decisions::new();
        let _ = decisions.missing_resolutions(&plan);
        let _ = decisions.missing_secrets(&plan);
    }
});
