//! BDD harness (cucumber-rs).
//!
//! Scenario tests drive the `statedump` binary; this crate only holds the
//! fixture builders they share.

use anyhow::Context;
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Zip `entries` (name, contents) in order.
pub fn zip_archive(entries: &[(&str, &str)]) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        zip.start_file(*name, SimpleFileOptions::default())
            .with_context(|| format!("start zip entry {name}"))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("write zip entry {name}"))?;
    }
    Ok(zip.finish().context("finish zip")?.into_inner())
}

/// A role object whose member is filled in from `replacements.properties`.
pub fn role_xml(description: &str) -> String {
    format!(
        "<role name=\"role\">\n  <description>{description}</description>\n  <member>CN=${{OPERATOR_CN}}</member>\n</role>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_starts_with_local_header() {
        let bytes = zip_archive(&[("role.xml", "<role/>")]).unwrap();
        assert_eq!(&bytes[..4], b"PK\x03\x04");
    }

    #[test]
    fn role_xml_keeps_placeholder() {
        assert!(role_xml("ops").contains("${OPERATOR_CN}"));
    }
}
