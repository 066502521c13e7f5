//! Minimal `.properties` reader shared by replacements and overrides.
//!
//! Supports `key=value` and `key: value` lines, `#`/`!` comment lines and
//! blank lines. Line continuations and `\u` escapes are not supported.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertiesError {
    #[error("line {line}: expected key=value")]
    MissingSeparator { line: usize },

    #[error("line {line}: empty key")]
    EmptyKey { line: usize },

    #[error("line {line}: duplicate key {key:?}")]
    DuplicateKey { line: usize, key: String },
}

/// Parse properties text into a sorted map. Line numbers are 1-based.
pub fn parse_properties(text: &str) -> Result<BTreeMap<String, String>, PropertiesError> {
    let mut out = BTreeMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let Some(pos) = line.find(['=', ':']) else {
            return Err(PropertiesError::MissingSeparator { line: line_no });
        };
        let key = line[..pos].trim();
        let value = line[pos + 1..].trim();
        if key.is_empty() {
            return Err(PropertiesError::EmptyKey { line: line_no });
        }
        if out.insert(key.to_string(), value.to_string()).is_some() {
            return Err(PropertiesError::DuplicateKey {
                line: line_no,
                key: key.to_string(),
            });
        }
    }
    Ok(out)
}
