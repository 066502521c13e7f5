use crate::properties::parse_properties;
use anyhow::Context;
use statedump_types::{ObjectKey, ObjectKind};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

/// Default overrides file name inside a staged directory.
pub const OVERRIDES_FILE: &str = "overrides.properties";

/// Identity renames applied before conflict detection.
///
/// Each line is `kind.name=newname`; the kind is the XML root tag, the name
/// may itself contain dots.
#[derive(Debug, Default)]
pub struct Overrides {
    renames: BTreeMap<ObjectKey, String>,
    used: RefCell<BTreeSet<ObjectKey>>,
}

impl Overrides {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let props = parse_properties(text).context("parse overrides")?;
        let mut renames = BTreeMap::new();
        for (lhs, new_name) in props {
            let Some((kind, name)) = lhs.split_once('.') else {
                anyhow::bail!("override {lhs:?}: expected kind.name on the left-hand side");
            };
            if kind.is_empty() || name.is_empty() {
                anyhow::bail!("override {lhs:?}: expected kind.name on the left-hand side");
            }
            if new_name.is_empty() {
                anyhow::bail!("override {lhs:?}: empty target name");
            }
            let key = ObjectKey::new(ObjectKind::from_tag(&kind.to_ascii_lowercase()), name);
            renames.insert(key, new_name);
        }
        Ok(Self {
            renames,
            used: RefCell::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    /// Target identity for `key`, recording that the override was used.
    pub fn apply(&self, key: &ObjectKey) -> ObjectKey {
        match self.renames.get(key) {
            Some(new_name) => {
                self.used.borrow_mut().insert(key.clone());
                ObjectKey::new(key.kind.clone(), new_name.clone())
            }
            None => key.clone(),
        }
    }

    /// Overrides that no `apply` call matched, sorted.
    pub fn unused(&self) -> Vec<ObjectKey> {
        let used = self.used.borrow();
        self.renames
            .keys()
            .filter(|k| !used.contains(*k))
            .cloned()
            .collect()
    }
}
