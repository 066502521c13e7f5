//! Default filesystem-backed and in-memory port implementations.

use crate::ports::{Authorizer, ConfigCache, ConfigurationStore, LockdownStore, Permission, StoreView};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use statedump_types::{ObjectKey, StoredObject};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

pub use statedump_domain::MemoryStore as InMemoryConfigStore;

/// File holding global flags inside the store root.
pub const GLOBAL_CONFIG_FILE: &str = "global.json";

/// One pretty JSON file per object under `<root>/objects/<kind>/<name>.json`.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    root: Utf8PathBuf,
}

impl FsConfigStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn object_path(&self, key: &ObjectKey) -> Utf8PathBuf {
        self.root
            .join("objects")
            .join(encode_component(key.kind.as_str()))
            .join(format!("{}.json", encode_component(&key.name)))
    }
}

impl StoreView for FsConfigStore {
    fn get(&self, key: &ObjectKey) -> anyhow::Result<Option<StoredObject>> {
        let path = self.object_path(key);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
        let object: StoredObject =
            serde_json::from_str(&text).with_context(|| format!("parse {path}"))?;
        if &object.key != key {
            anyhow::bail!("{path} holds {} instead of {key}", object.key);
        }
        Ok(Some(object))
    }
}

impl ConfigurationStore for FsConfigStore {
    fn save(&mut self, object: &StoredObject) -> anyhow::Result<()> {
        let path = self.object_path(&object.key);
        let mut json = serde_json::to_string_pretty(object).context("serialize object")?;
        json.push('\n');
        write_atomic(&path, json.as_bytes())?;
        debug!(key = %object.key, path = %path, "saved object");
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GlobalConfig {
    #[serde(default)]
    statedump_locked_down: bool,

    #[serde(flatten)]
    other: BTreeMap<String, serde_json::Value>,
}

/// Lockdown flag persisted in `<root>/global.json`.
#[derive(Debug, Clone)]
pub struct FsLockdownStore {
    root: Utf8PathBuf,
}

impl FsLockdownStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    fn path(&self) -> Utf8PathBuf {
        self.root.join(GLOBAL_CONFIG_FILE)
    }

    fn read(&self) -> anyhow::Result<GlobalConfig> {
        let path = self.path();
        if !path.is_file() {
            return Ok(GlobalConfig::default());
        }
        let text = fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
        serde_json::from_str(&text).with_context(|| format!("parse {path}"))
    }
}

impl LockdownStore for FsLockdownStore {
    fn load(&self) -> anyhow::Result<bool> {
        Ok(self.read()?.statedump_locked_down)
    }

    fn persist_locked(&self) -> anyhow::Result<()> {
        let mut global = self.read()?;
        global.statedump_locked_down = true;
        let mut json = serde_json::to_string_pretty(&global).context("serialize global config")?;
        json.push('\n');
        write_atomic(&self.path(), json.as_bytes())
    }
}

/// In-memory lockdown flag. Clones share the flag, so a test can load a
/// second [`Lockdown`](crate::Lockdown) from the same store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLockdownStore {
    locked: Arc<AtomicBool>,
}

impl InMemoryLockdownStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockdownStore for InMemoryLockdownStore {
    fn load(&self) -> anyhow::Result<bool> {
        Ok(self.locked.load(Ordering::SeqCst))
    }

    fn persist_locked(&self) -> anyhow::Result<()> {
        self.locked.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Grants everything to everyone. For single-operator command-line use.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_authorized(&self, _principal: &str, _permission: Permission) -> bool {
        true
    }
}

/// Grants every permission to a fixed set of principals.
#[derive(Debug, Clone, Default)]
pub struct RequirePrincipal {
    principals: BTreeSet<String>,
}

impl RequirePrincipal {
    pub fn new<I, S>(principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            principals: principals.into_iter().map(Into::into).collect(),
        }
    }
}

impl Authorizer for RequirePrincipal {
    fn is_authorized(&self, principal: &str, _permission: Permission) -> bool {
        self.principals.contains(principal)
    }
}

/// Nothing to invalidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl ConfigCache for NoopCache {
    fn invalidate(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Write `contents` to a temp file next to `path`, then rename over it.
fn write_atomic(path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("{path} has no parent directory"))?;
    fs::create_dir_all(parent).with_context(|| format!("create_dir_all {parent}"))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {parent}"))?;
    tmp.write_all(contents)
        .with_context(|| format!("write temp file for {path}"))?;
    tmp.persist(path)
        .with_context(|| format!("rename temp file to {path}"))?;
    Ok(())
}

/// Percent-encode everything but `[A-Za-z0-9_-]` so any kind or name maps to
/// one safe path component.
fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
