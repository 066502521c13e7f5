use crate::decisions::Secret;
use crate::keys::ObjectKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The unit persisted by the configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: ObjectKey,

    #[serde(default)]
    pub fields: BTreeMap<String, String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::decisions::exposed"
    )]
    pub secret: Option<Secret>,
}

impl StoredObject {
    pub fn new(key: ObjectKey, fields: BTreeMap<String, String>) -> Self {
        Self {
            key,
            fields,
            secret: None,
        }
    }

    /// Overlay `incoming` onto `self`: incoming fields win, fields only
    /// present in `self` are kept. A secret on `incoming` replaces ours.
    pub fn merge_from(&mut self, incoming: StoredObject) {
        self.fields.extend(incoming.fields);
        if incoming.secret.is_some() {
            self.secret = incoming.secret;
        }
    }
}
