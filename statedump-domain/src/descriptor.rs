//! Object files: one XML document per importable object.
//!
//! ```xml
//! <role name="admins">
//!   <description>Administrators</description>
//!   <member>CN=${ADMIN_CN}</member>
//! </role>
//! ```
//!
//! The root tag is the kind, the optional `name` attribute the name (falls
//! back to the file stem), and the flat children the fields.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use sha2::{Digest, Sha256};
use statedump_types::{ObjectKey, ObjectKind, StoredObject};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{file}: {message}")]
pub struct DescriptorError {
    pub file: String,
    pub message: String,
}

impl DescriptorError {
    fn new(file: &str, message: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            message: message.into(),
        }
    }
}

/// One parsed object, ready to be planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Target identity, after overrides.
    pub key: ObjectKey,
    /// Identity as written in the file.
    pub original_key: ObjectKey,
    pub source_file: String,
    pub fields: BTreeMap<String, String>,
}

impl ObjectDescriptor {
    pub fn new(key: ObjectKey, source_file: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            original_key: key.clone(),
            key,
            source_file: source_file.into(),
            fields,
        }
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.fields)
    }

    pub fn to_stored(&self) -> StoredObject {
        StoredObject::new(self.key.clone(), self.fields.clone())
    }
}

/// sha256 over the sorted fields of a map, each name and value prefixed with
/// its length so no value can imitate a field boundary.
pub fn fingerprint(fields: &BTreeMap<String, String>) -> String {
    let mut h = Sha256::new();
    for (name, value) in fields {
        h.update((name.len() as u64).to_le_bytes());
        h.update(name.as_bytes());
        h.update((value.len() as u64).to_le_bytes());
        h.update(value.as_bytes());
    }
    hex::encode(h.finalize())
}

/// Replace every `${key}` with its (XML-escaped) value.
///
/// Returns the substituted text and the placeholders that had no value;
/// those are left in the text unchanged.
pub fn substitute(text: &str, values: &BTreeMap<String, String>) -> (String, BTreeSet<String>) {
    let mut out = String::with_capacity(text.len());
    let mut unknown = BTreeSet::new();
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let name = &after[..end];
        match values.get(name) {
            Some(value) => out.push_str(&quick_xml::escape::escape(value.as_str())),
            None => {
                unknown.insert(name.to_string());
                out.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    (out, unknown)
}

/// Parse one object file. `file_name` is used for the fallback name and in
/// error messages.
pub fn parse_object_xml(file_name: &str, xml: &str) -> Result<ObjectDescriptor, DescriptorError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<(String, Option<String>)> = None;
    let mut fields = BTreeMap::new();
    let mut field: Option<String> = None;
    let mut text = String::new();
    let mut depth = 0usize;
    let mut closed = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            DescriptorError::new(
                file_name,
                format!("malformed XML at byte {}: {e}", reader.buffer_position()),
            )
        })?;

        match event {
            Event::Eof => break,
            Event::Start(e) => {
                let tag = tag_name(file_name, &e)?;
                match depth {
                    0 => {
                        if closed {
                            return Err(DescriptorError::new(file_name, "more than one root element"));
                        }
                        root = Some((tag, name_attr(file_name, &e)?));
                    }
                    1 => {
                        field = Some(tag);
                        text.clear();
                    }
                    _ => {
                        return Err(DescriptorError::new(
                            file_name,
                            format!("nested element <{tag}> is not supported"),
                        ));
                    }
                }
                depth += 1;
            }
            Event::Empty(e) => {
                let tag = tag_name(file_name, &e)?;
                match depth {
                    0 => {
                        if closed {
                            return Err(DescriptorError::new(file_name, "more than one root element"));
                        }
                        root = Some((tag, name_attr(file_name, &e)?));
                        closed = true;
                    }
                    1 => insert_field(file_name, &mut fields, tag, String::new())?,
                    _ => {
                        return Err(DescriptorError::new(
                            file_name,
                            format!("nested element <{tag}> is not supported"),
                        ));
                    }
                }
            }
            Event::Text(t) => {
                let value = t
                    .unescape()
                    .map_err(|e| DescriptorError::new(file_name, format!("bad text: {e}")))?;
                if depth == 2 {
                    text.push_str(&value);
                } else {
                    return Err(DescriptorError::new(
                        file_name,
                        format!("unexpected text {:?} outside a field", value.as_ref()),
                    ));
                }
            }
            Event::CData(c) => {
                if depth != 2 {
                    return Err(DescriptorError::new(file_name, "CDATA outside a field"));
                }
                let value = std::str::from_utf8(&c)
                    .map_err(|e| DescriptorError::new(file_name, format!("bad CDATA: {e}")))?;
                text.push_str(value);
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                match depth {
                    1 => {
                        if let Some(tag) = field.take() {
                            insert_field(file_name, &mut fields, tag, std::mem::take(&mut text))?;
                        }
                    }
                    0 => closed = true,
                    _ => {}
                }
            }
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if depth != 0 {
        return Err(DescriptorError::new(file_name, "unexpected end of document"));
    }
    let Some((tag, name)) = root else {
        return Err(DescriptorError::new(file_name, "no root element"));
    };

    let name = match name {
        Some(n) => n,
        None => file_stem(file_name).to_string(),
    };
    if name.trim().is_empty() {
        return Err(DescriptorError::new(file_name, "empty object name"));
    }

    let key = ObjectKey::new(ObjectKind::from_tag(&tag.to_ascii_lowercase()), name);
    Ok(ObjectDescriptor::new(key, file_name, fields))
}

fn tag_name(file_name: &str, e: &BytesStart<'_>) -> Result<String, DescriptorError> {
    std::str::from_utf8(e.name().as_ref())
        .map(str::to_string)
        .map_err(|err| DescriptorError::new(file_name, format!("tag is not UTF-8: {err}")))
}

fn name_attr(file_name: &str, e: &BytesStart<'_>) -> Result<Option<String>, DescriptorError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| DescriptorError::new(file_name, format!("bad attribute: {err}")))?;
        if attr.key.as_ref() == b"name" {
            let value = attr
                .unescape_value()
                .map_err(|err| DescriptorError::new(file_name, format!("bad name attribute: {err}")))?;
            return Ok(Some(value.trim().to_string()));
        }
    }
    Ok(None)
}

fn insert_field(
    file_name: &str,
    fields: &mut BTreeMap<String, String>,
    tag: String,
    value: String,
) -> Result<(), DescriptorError> {
    if fields.contains_key(&tag) {
        return Err(DescriptorError::new(file_name, format!("duplicate field <{tag}>")));
    }
    fields.insert(tag, value);
    Ok(())
}

fn file_stem(file_name: &str) -> &str {
    file_name.strip_suffix(".xml").unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vals(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_kind_name_and_fields() {
        let xml = r#"<?xml version="1.0"?>
            <!-- exported -->
            <role name="admins">
              <description>Administrators &amp; auditors</description>
              <member><![CDATA[CN=<root>]]></member>
              <flag/>
            </role>"#;
        let d = parse_object_xml("role.xml", xml).unwrap();
        assert_eq!(d.key.to_string(), "role/admins");
        assert_eq!(d.original_key, d.key);
        assert_eq!(d.source_file, "role.xml");
        assert_eq!(
            d.fields,
            vals(&[
                ("description", "Administrators & auditors"),
                ("flag", ""),
                ("member", "CN=<root>"),
            ])
        );
    }

    #[test]
    fn name_falls_back_to_file_stem() {
        let d = parse_object_xml("hsm-token.xml", "<CryptoToken><slotLabel>1</slotLabel></CryptoToken>").unwrap();
        assert_eq!(d.key.kind, ObjectKind::CryptoToken);
        assert_eq!(d.key.name, "hsm-token");
        assert!(d.fields.contains_key("slotLabel"));
    }

    #[test]
    fn empty_root_element_is_an_object_without_fields() {
        let d = parse_object_xml("x.xml", r#"<certprofile name="server"/>"#).unwrap();
        assert_eq!(d.key.to_string(), "certprofile/server");
        assert!(d.fields.is_empty());
    }

    #[test]
    fn rejects_nested_and_duplicate_fields() {
        let nested = parse_object_xml("a.xml", "<role><x><y>1</y></x></role>").unwrap_err();
        assert!(nested.message.contains("nested"), "{nested}");

        let dup = parse_object_xml("b.xml", "<role><x>1</x><x>2</x></role>").unwrap_err();
        assert!(dup.message.contains("duplicate field"), "{dup}");
        assert_eq!(dup.file, "b.xml");
    }

    #[test]
    fn rejects_documents_without_root_or_truncated() {
        assert!(parse_object_xml("a.xml", "<?xml version=\"1.0\"?>").is_err());
        assert!(parse_object_xml("a.xml", "").is_err());
        assert!(parse_object_xml("a.xml", "<role><x>1</x>").is_err());
        assert!(parse_object_xml("a.xml", "<role></other>").is_err());
    }

    #[test]
    fn rejects_loose_text() {
        let err = parse_object_xml("a.xml", "<role>hello<x>1</x></role>").unwrap_err();
        assert!(err.message.contains("outside a field"), "{err}");
    }

    #[test]
    fn substitute_replaces_known_and_reports_unknown() {
        let (out, unknown) = substitute(
            "<a>${HOST}:${PORT}/${MISSING}</a>",
            &vals(&[("HOST", "ca.example.org"), ("PORT", "8443")]),
        );
        assert_eq!(out, "<a>ca.example.org:8443/${MISSING}</a>");
        assert_eq!(unknown.into_iter().collect::<Vec<_>>(), vec!["MISSING"]);
    }

    #[test]
    fn substitute_escapes_values_and_keeps_unterminated_placeholders() {
        let (out, unknown) = substitute("<a>${V}</a>${OPEN", &vals(&[("V", "a<b")]));
        assert_eq!(out, "<a>a&lt;b</a>${OPEN");
        assert!(unknown.is_empty());
    }

    #[test]
    fn fingerprint_depends_on_content_only() {
        let a = fingerprint(&vals(&[("x", "1"), ("y", "2")]));
        let b = fingerprint(&vals(&[("y", "2"), ("x", "1")]));
        let c = fingerprint(&vals(&[("x", "1"), ("y", "3")]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_keeps_field_boundaries() {
        let split = fingerprint(&vals(&[("a", "1"), ("b", "2")]));
        let embedded = fingerprint(&vals(&[("a", "1\nb=2")]));
        assert_ne!(split, embedded);

        let shifted = fingerprint(&vals(&[("a=", "1")]));
        let plain = fingerprint(&vals(&[("a", "=1")]));
        assert_ne!(shifted, plain);
    }
}
