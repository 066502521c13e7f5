//! Entry name normalization and the allow-list.

/// The one non-XML file a statedump may carry.
pub const REPLACEMENTS_FILE: &str = "replacements.properties";

/// Keep only the final path segment of an archive entry name.
///
/// `../../evil.xml` becomes `evil.xml`; both separators are honoured so
/// archives built on Windows cannot smuggle a parent path either.
pub fn normalize_entry_name(raw: &str) -> &str {
    raw.rsplit(&['/', '\\'][..]).next().unwrap_or(raw)
}

/// Allow-list: `[a-z0-9_-]+\.xml` or exactly `replacements.properties`.
pub fn is_allowed_name(name: &str) -> bool {
    if name == REPLACEMENTS_FILE {
        return true;
    }
    let Some(stem) = name.strip_suffix(".xml") else {
        return false;
    };
    !stem.is_empty()
        && stem
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}
