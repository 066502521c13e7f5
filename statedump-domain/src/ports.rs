use statedump_types::{ObjectKey, StoredObject};
use std::collections::BTreeMap;

/// Read-only view of the live configuration store.
///
/// The planner only ever needs this; writes go through [`ConfigurationStore`].
pub trait StoreView {
    fn get(&self, key: &ObjectKey) -> anyhow::Result<Option<StoredObject>>;

    fn contains(&self, key: &ObjectKey) -> anyhow::Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Writable configuration store.
pub trait ConfigurationStore: StoreView {
    /// Insert or replace the object stored under `object.key`.
    fn save(&mut self, object: &StoredObject) -> anyhow::Result<()>;
}

/// In-memory store, used by tests and by callers that stage into memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: BTreeMap<ObjectKey, StoredObject>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects(objects: impl IntoIterator<Item = StoredObject>) -> Self {
        Self {
            objects: objects.into_iter().map(|o| (o.key.clone(), o)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> impl Iterator<Item = &StoredObject> {
        self.objects.values()
    }
}

impl StoreView for MemoryStore {
    fn get(&self, key: &ObjectKey) -> anyhow::Result<Option<StoredObject>> {
        Ok(self.objects.get(key).cloned())
    }

    fn contains(&self, key: &ObjectKey) -> anyhow::Result<bool> {
        Ok(self.objects.contains_key(key))
    }
}

impl ConfigurationStore for MemoryStore {
    fn save(&mut self, object: &StoredObject) -> anyhow::Result<()> {
        self.objects.insert(object.key.clone(), object.clone());
        Ok(())
    }
}
