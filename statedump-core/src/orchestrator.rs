//! Import orchestration: authorization, lockdown, staging, plan, commit.
//!
//! Every call runs the same gate sequence. Authorization comes first,
//! then the lockdown check, both before anything touches the filesystem.

use crate::adapters::{AllowAll, FsConfigStore, FsLockdownStore, NoopCache};
use crate::error::ImportError;
use crate::lockdown::Lockdown;
use crate::ports::{Authorizer, ConfigCache, ConfigurationStore, Permission};
use crate::settings::{ImportOptions, ImportSettings};
use anyhow::Context;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use fs_err as fs;
use sha2::{Digest, Sha256};
use statedump_commit::{CommitOptions, CommitOutcome};
use statedump_domain::{PlanContext, Planner};
use statedump_types::{Decisions, ImportPlan, ImportResult};
use statedump_unpack::{UnpackOptions, UnpackedDir};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Optional one-line description inside a template directory.
pub const TEMPLATE_DESCRIPTION_FILE: &str = "description.txt";

const CACHE_WARNING: &str = "imported, but caches could not be cleared";
const LOCKDOWN_WARNING: &str = "imported, but lockdown could not be engaged";

/// Where the objects to import come from.
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// Raw zip bytes, untrusted.
    Archive(Vec<u8>),
    /// An already extracted statedump directory.
    Directory(Utf8PathBuf),
    /// A named subdirectory of the configured templates directory.
    Template(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInfo {
    pub name: String,
    pub description: Option<String>,
}

/// A source made available as a directory for the duration of one call.
enum Staged {
    Unpacked(UnpackedDir),
    Dir(Utf8PathBuf),
}

impl Staged {
    fn path(&self) -> &Utf8Path {
        match self {
            Staged::Unpacked(u) => u.path(),
            Staged::Dir(p) => p,
        }
    }

    fn ignored(&self) -> Vec<String> {
        match self {
            Staged::Unpacked(u) => u.ignored().iter().map(|e| e.name.clone()).collect(),
            Staged::Dir(_) => Vec::new(),
        }
    }
}

pub struct Importer {
    settings: ImportSettings,
    store: Mutex<Box<dyn ConfigurationStore + Send>>,
    lockdown: Arc<Lockdown>,
    authorizer: Box<dyn Authorizer + Send + Sync>,
    cache: Box<dyn ConfigCache + Send + Sync>,
}

impl Importer {
    /// Importer over the given store and lockdown latch, admitting every
    /// principal and with no cache to invalidate.
    pub fn new(
        settings: ImportSettings,
        store: Box<dyn ConfigurationStore + Send>,
        lockdown: Arc<Lockdown>,
    ) -> Self {
        Self {
            settings,
            store: Mutex::new(store),
            lockdown,
            authorizer: Box::new(AllowAll),
            cache: Box::new(NoopCache),
        }
    }

    /// Filesystem store and lockdown flag, both under `settings.store_root`.
    pub fn from_settings(settings: ImportSettings) -> anyhow::Result<Self> {
        let root = settings.store_root.clone();
        let lockdown = Lockdown::load(Box::new(FsLockdownStore::new(root.clone())))
            .with_context(|| format!("load lockdown state from {root}"))?;
        Ok(Self::new(
            settings,
            Box::new(FsConfigStore::new(root)),
            Arc::new(lockdown),
        ))
    }

    pub fn with_authorizer(mut self, authorizer: impl Authorizer + Send + Sync + 'static) -> Self {
        self.authorizer = Box::new(authorizer);
        self
    }

    pub fn with_cache(mut self, cache: impl ConfigCache + Send + Sync + 'static) -> Self {
        self.cache = Box::new(cache);
        self
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// True while the import feature has not been locked down.
    pub fn is_available(&self) -> bool {
        self.lockdown.is_available()
    }

    /// Plan `source` against the current store. Never writes.
    pub fn dry_run(
        &self,
        principal: &str,
        source: &ImportSource,
        options: &ImportOptions,
    ) -> Result<ImportPlan, ImportError> {
        self.authorize(principal, Permission::Import)?;
        self.ensure_unlocked()?;

        let staged = self.stage(source)?;
        let ctx = plan_context(&staged, options);
        let store = self.store()?;
        let plan = Planner::new()
            .plan(staged.path(), &ctx, &**store)
            .context("plan import")?;
        info!(
            objects = plan.summary.objects_total,
            conflicts = plan.summary.conflicts,
            secrets = plan.summary.passwords_needed,
            "dry run finished"
        );
        Ok(plan)
    }

    /// Write `source` into the store using `decisions`.
    pub fn commit(
        &self,
        principal: &str,
        source: &ImportSource,
        decisions: &Decisions,
        options: &ImportOptions,
    ) -> Result<ImportResult, ImportError> {
        self.import_with(principal, source, options, |_| decisions.clone())
    }

    /// Stage once, plan, let `decide` look at the plan, then commit with the
    /// returned decisions.
    pub fn import_with<F>(
        &self,
        principal: &str,
        source: &ImportSource,
        options: &ImportOptions,
        decide: F,
    ) -> Result<ImportResult, ImportError>
    where
        F: FnOnce(&ImportPlan) -> Decisions,
    {
        self.authorize(principal, Permission::Import)?;
        self.ensure_unlocked()?;

        let staged = self.stage(source)?;
        let ctx = plan_context(&staged, options);
        let mut store = self.store()?;
        let plan = Planner::new()
            .plan(staged.path(), &ctx, &**store)
            .context("plan import")?;
        let decisions = decide(&plan);

        // The latch may have been engaged while we were unpacking or deciding.
        self.ensure_unlocked()?;

        let commit_opts = CommitOptions {
            merge_crypto_tokens: options.merge_crypto_tokens,
        };
        let outcome =
            statedump_commit::commit(staged.path(), &ctx, &decisions, &commit_opts, &mut **store)?;
        drop(store);
        drop(staged);

        self.finish(outcome, source, options)
    }

    /// Engage the lockdown latch. Idempotent.
    pub fn lockdown(&self, principal: &str) -> Result<(), ImportError> {
        self.authorize(principal, Permission::Lockdown)?;
        if self.lockdown.is_locked() {
            return Ok(());
        }
        self.lockdown.engage().context("engage lockdown")?;
        if let Err(e) = self.cache.invalidate() {
            warn!(error = %format!("{e:#}"), "lockdown engaged, but caches could not be cleared");
        }
        Ok(())
    }

    /// Templates under the configured templates directory, sorted by name.
    pub fn available_templates(&self, principal: &str) -> Result<Vec<TemplateInfo>, ImportError> {
        self.authorize(principal, Permission::Import)?;
        let Some(base) = &self.settings.templates_dir else {
            return Ok(Vec::new());
        };
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for entry in fs::read_dir(base).with_context(|| format!("read dir {base}"))? {
            let entry = entry.with_context(|| format!("read dir {base}"))?;
            if !entry.file_type().context("file type")?.is_dir() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let desc_path = base.join(&name).join(TEMPLATE_DESCRIPTION_FILE);
            let description = if desc_path.is_file() {
                let text = fs::read_to_string(&desc_path)
                    .with_context(|| format!("read {desc_path}"))?;
                Some(text.trim().to_string()).filter(|s| !s.is_empty())
            } else {
                None
            };
            out.push(TemplateInfo { name, description });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn authorize(&self, principal: &str, permission: Permission) -> Result<(), ImportError> {
        if self.authorizer.is_authorized(principal, permission) {
            Ok(())
        } else {
            warn!(principal = %principal, permission = %permission, "not authorized");
            Err(ImportError::Unauthorized {
                principal: principal.to_string(),
                permission,
            })
        }
    }

    fn ensure_unlocked(&self) -> Result<(), ImportError> {
        if self.lockdown.is_locked() {
            Err(ImportError::Locked)
        } else {
            Ok(())
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, Box<dyn ConfigurationStore + Send>>, ImportError> {
        self.store
            .lock()
            .map_err(|_| ImportError::Internal(anyhow::anyhow!("configuration store lock poisoned")))
    }

    fn stage(&self, source: &ImportSource) -> Result<Staged, ImportError> {
        match source {
            ImportSource::Archive(bytes) => {
                let opts = UnpackOptions {
                    max_total_bytes: self.settings.max_total_bytes,
                    temp_root: self.settings.temp_root.clone(),
                };
                let unpacked = statedump_unpack::unpack(bytes, &opts)?;
                info!(
                    files = unpacked.accepted().len(),
                    ignored = unpacked.ignored().len(),
                    "archive unpacked"
                );
                Ok(Staged::Unpacked(unpacked))
            }
            ImportSource::Directory(dir) => {
                if !dir.is_dir() {
                    return Err(anyhow::anyhow!("{dir} is not a directory").into());
                }
                Ok(Staged::Dir(dir.clone()))
            }
            ImportSource::Template(name) => {
                let dir = self.template_dir(name)?;
                Ok(Staged::Dir(dir))
            }
        }
    }

    fn template_dir(&self, name: &str) -> Result<Utf8PathBuf, ImportError> {
        let invalid = || ImportError::InvalidTemplate {
            name: name.to_string(),
        };
        let mut components = Utf8Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Utf8Component::Normal(c)), None) if c == name => {}
            _ => return Err(invalid()),
        }
        let Some(base) = &self.settings.templates_dir else {
            return Err(anyhow::anyhow!("no templates directory configured").into());
        };
        let dir = base.join(name);
        if !dir.is_dir() {
            return Err(invalid());
        }
        Ok(dir)
    }

    fn finish(
        &self,
        outcome: CommitOutcome,
        source: &ImportSource,
        options: &ImportOptions,
    ) -> Result<ImportResult, ImportError> {
        let mut result = ImportResult::new(outcome.applied, outcome.notices);
        if let ImportSource::Archive(bytes) = source {
            result.source_id = Some(source_id(bytes));
        }

        // The store is already written; report the latch failure on the
        // result instead of losing what was applied.
        if options.lockdown_after_import {
            match self.lockdown.engage() {
                Ok(()) => result.lockdown_engaged = true,
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "lockdown after import failed");
                    result.notices.push(LOCKDOWN_WARNING.to_string());
                }
            }
        }

        if let Err(e) = self.cache.invalidate() {
            warn!(error = %format!("{e:#}"), "cache invalidation failed");
            result.notices.push(CACHE_WARNING.to_string());
        }

        info!(
            run_id = %result.run_id,
            applied = result.summary.applied,
            merged = result.summary.merged,
            skipped = result.summary.skipped,
            "import finished"
        );
        Ok(result)
    }
}

fn plan_context(staged: &Staged, options: &ImportOptions) -> PlanContext {
    PlanContext {
        overrides_file: options.overrides_file.clone(),
        ignored_files: staged.ignored(),
    }
}

/// First six upper-case hex digits of the archive's sha256.
pub fn source_id(bytes: &[u8]) -> String {
    let digest = hex::encode_upper(Sha256::digest(bytes));
    digest[..6].to_string()
}
