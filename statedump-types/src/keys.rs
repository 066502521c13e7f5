use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of an importable object, taken from the XML root element.
///
/// Two kinds get special treatment during import:
/// - `CryptoToken`: needs an activation secret and may be merged.
/// - `Replacements`: the substitution table, always merged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObjectKind {
    CryptoToken,
    Replacements,
    Other(String),
}

impl ObjectKind {
    pub const CRYPTO_TOKEN_TAG: &'static str = "cryptotoken";
    pub const REPLACEMENTS_TAG: &'static str = "replacements";

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            Self::CRYPTO_TOKEN_TAG => ObjectKind::CryptoToken,
            Self::REPLACEMENTS_TAG => ObjectKind::Replacements,
            other => ObjectKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ObjectKind::CryptoToken => Self::CRYPTO_TOKEN_TAG,
            ObjectKind::Replacements => Self::REPLACEMENTS_TAG,
            ObjectKind::Other(tag) => tag,
        }
    }

    pub fn is_crypto_token(&self) -> bool {
        matches!(self, ObjectKind::CryptoToken)
    }

    pub fn is_replacements(&self) -> bool {
        matches!(self, ObjectKind::Replacements)
    }
}

impl From<String> for ObjectKind {
    fn from(tag: String) -> Self {
        ObjectKind::from_tag(&tag)
    }
}

impl From<ObjectKind> for String {
    fn from(kind: ObjectKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one importable object: kind plus stable name.
///
/// Serialized as `kind/name` so it can be used as a JSON map key in
/// decisions files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey {
    pub kind: ObjectKind,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid object key {input:?}: expected kind/name")]
pub struct KeyParseError {
    pub input: String,
}

impl FromStr for ObjectKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Kinds are XML tags and never contain '/', names may. Tags are
        // matched case-insensitively, as when descriptors are parsed.
        match s.split_once('/') {
            Some((kind, name)) if !kind.is_empty() && !name.is_empty() => Ok(ObjectKey::new(
                ObjectKind::from_tag(&kind.to_ascii_lowercase()),
                name,
            )),
            _ => Err(KeyParseError {
                input: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn special_kinds_are_recognized_by_tag() {
        assert_eq!(ObjectKind::from_tag("cryptotoken"), ObjectKind::CryptoToken);
        assert_eq!(ObjectKind::from_tag("replacements"), ObjectKind::Replacements);
        assert_eq!(
            ObjectKind::from_tag("role"),
            ObjectKind::Other("role".to_string())
        );
    }

    #[test]
    fn key_display_and_parse_agree() {
        let key: ObjectKey = "cryptotoken/hsm-1".parse().unwrap();
        assert_eq!(key.kind, ObjectKind::CryptoToken);
        assert_eq!(key.name, "hsm-1");
        assert_eq!(key.to_string(), "cryptotoken/hsm-1");
    }

    #[test]
    fn kind_is_case_insensitive_and_name_is_not() {
        let key: ObjectKey = "CryptoToken/HSM".parse().unwrap();
        assert_eq!(key.kind, ObjectKind::CryptoToken);
        assert_eq!(key.name, "HSM");

        let key: ObjectKey = "Role/Admins".parse().unwrap();
        assert_eq!(key, "role/Admins".parse().unwrap());
        assert_eq!(key.to_string(), "role/Admins");
    }

    #[test]
    fn name_may_contain_slashes() {
        let key: ObjectKey = "role/ops/admins".parse().unwrap();
        assert_eq!(key.name, "ops/admins");
    }

    #[test]
    fn rejects_keys_without_separator() {
        assert!("role".parse::<ObjectKey>().is_err());
        assert!("/admins".parse::<ObjectKey>().is_err());
        assert!("role/".parse::<ObjectKey>().is_err());
    }

    #[test]
    fn keys_serialize_as_strings() {
        let key = ObjectKey::new(ObjectKind::Other("role".into()), "admins");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"role/admins\"");
        let back: ObjectKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    proptest! {
        #[test]
        fn display_parse_is_identity(kind in "[a-z][a-z0-9_-]{0,8}", name in "[A-Za-z0-9_ ./-]{1,16}") {
            let key = ObjectKey::new(ObjectKind::from_tag(&kind), name);
            let parsed: ObjectKey = key.to_string().parse().unwrap();
            prop_assert_eq!(parsed, key);
        }
    }
}
