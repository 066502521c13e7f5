use crate::descriptor::{ObjectDescriptor, parse_object_xml, substitute};
use crate::overrides::{OVERRIDES_FILE, Overrides};
use crate::ports::StoreView;
use crate::properties::parse_properties;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use statedump_types::{
    ConflictEntry, ImportPlan, ObjectKey, ObjectKind, PasswordRequirement, PlanSummary,
    PlannedObject,
};
use statedump_unpack::{REPLACEMENTS_FILE, is_allowed_name};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Name of the object built from `replacements.properties`.
pub const REPLACEMENTS_OBJECT: &str = "replacements";

const SECRET_REASON: &str = "crypto token activation secret is not part of the export";

#[derive(Debug, Clone, Default)]
pub struct PlanContext {
    /// Overrides file to use. `None` means `overrides.properties` inside the
    /// planned directory, when present.
    pub overrides_file: Option<Utf8PathBuf>,
    /// Names the unpacker dropped; reported as notices.
    pub ignored_files: Vec<String>,
}

/// Every object of a staged statedump, parsed and renamed, in key order.
#[derive(Debug, Clone, Default)]
pub struct LoadedDump {
    pub descriptors: Vec<ObjectDescriptor>,
    pub ignored_files: Vec<String>,
    pub notices: Vec<String>,
}

impl LoadedDump {
    pub fn get(&self, key: &ObjectKey) -> Option<&ObjectDescriptor> {
        self.descriptors
            .binary_search_by(|d| d.key.cmp(key))
            .ok()
            .map(|idx| &self.descriptors[idx])
    }
}

#[derive(Debug, Clone, Default)]
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    /// Dry run: read `dir` and compare it with `store`. Never writes.
    pub fn plan(
        &self,
        dir: &Utf8Path,
        ctx: &PlanContext,
        store: &dyn StoreView,
    ) -> anyhow::Result<ImportPlan> {
        let dump = self.load(dir, ctx)?;
        self.plan_loaded(&dump, store)
    }

    /// Parse every object file in `dir`.
    pub fn load(&self, dir: &Utf8Path, ctx: &PlanContext) -> anyhow::Result<LoadedDump> {
        let files = list_object_files(dir)?;
        let mut notices = Vec::new();

        let replacements = if files.iter().any(|f| f == REPLACEMENTS_FILE) {
            let path = dir.join(REPLACEMENTS_FILE);
            let text = fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
            parse_properties(&text).with_context(|| format!("parse {REPLACEMENTS_FILE}"))?
        } else {
            BTreeMap::new()
        };

        let overrides = load_overrides(dir, ctx)?;

        let mut by_key: BTreeMap<ObjectKey, ObjectDescriptor> = BTreeMap::new();
        let mut unknown_placeholders: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for file in &files {
            let descriptor = if file == REPLACEMENTS_FILE {
                ObjectDescriptor::new(
                    ObjectKey::new(ObjectKind::Replacements, REPLACEMENTS_OBJECT),
                    file.as_str(),
                    replacements.clone(),
                )
            } else {
                let path = dir.join(file);
                let raw = fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
                let (xml, unknown) = substitute(&raw, &replacements);
                if !unknown.is_empty() {
                    unknown_placeholders.insert(file.clone(), unknown);
                }
                let mut d = parse_object_xml(file, &xml)?;
                if !d.key.kind.is_replacements() {
                    d.key = overrides.apply(&d.original_key);
                }
                d
            };

            if let Some(existing) = by_key.get(&descriptor.key) {
                anyhow::bail!(
                    "{} is defined by both {} and {}",
                    descriptor.key,
                    existing.source_file,
                    descriptor.source_file
                );
            }
            debug!(key = %descriptor.key, file = %descriptor.source_file, "loaded object");
            by_key.insert(descriptor.key.clone(), descriptor);
        }

        notices.push(count_notice(by_key.keys()));
        let mut ignored_files = ctx.ignored_files.clone();
        ignored_files.sort();
        for name in &ignored_files {
            notices.push(format!("Ignored file {name}"));
        }
        for (file, names) in &unknown_placeholders {
            for name in names {
                notices.push(format!("Unknown placeholder ${{{name}}} in {file}"));
            }
        }
        for key in overrides.unused() {
            notices.push(format!("Override for {key} matched no object"));
        }

        Ok(LoadedDump {
            descriptors: by_key.into_values().collect(),
            ignored_files,
            notices,
        })
    }

    /// Compare already loaded objects with `store`.
    pub fn plan_loaded(&self, dump: &LoadedDump, store: &dyn StoreView) -> anyhow::Result<ImportPlan> {
        let mut plan = ImportPlan::new();

        for d in &dump.descriptors {
            let incoming = d.fingerprint();
            let mut conflict = false;

            if !d.key.kind.is_replacements()
                && let Some(stored) = store
                    .get(&d.key)
                    .with_context(|| format!("look up {}", d.key))?
            {
                conflict = true;
                plan.conflicts.push(ConflictEntry {
                    key: d.key.clone(),
                    source_file: d.source_file.clone(),
                    stored_fingerprint: crate::descriptor::fingerprint(&stored.fields),
                    incoming_fingerprint: incoming.clone(),
                });
            }

            let needs_secret = d.key.kind.is_crypto_token();
            if needs_secret {
                plan.passwords_needed.push(PasswordRequirement {
                    key: d.key.clone(),
                    source_file: d.source_file.clone(),
                    reason: SECRET_REASON.to_string(),
                });
            }

            plan.objects.push(PlannedObject {
                key: d.key.clone(),
                source_file: d.source_file.clone(),
                fingerprint: incoming,
                conflict,
                needs_secret,
            });
        }

        plan.notices = dump.notices.clone();

        plan.summary = PlanSummary {
            objects_total: plan.objects.len() as u64,
            conflicts: plan.conflicts.len() as u64,
            passwords_needed: plan.passwords_needed.len() as u64,
            files_ignored: dump.ignored_files.len() as u64,
        };
        Ok(plan)
    }
}

fn list_object_files(dir: &Utf8Path) -> anyhow::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {dir}"))? {
        let entry = entry.with_context(|| format!("read dir {dir}"))?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            debug!(dir = %dir, "skipping non UTF-8 file name");
            continue;
        };
        if is_allowed_name(&name) {
            files.push(name);
        } else {
            debug!(name = %name, "not an object file");
        }
    }
    files.sort();
    Ok(files)
}

fn load_overrides(dir: &Utf8Path, ctx: &PlanContext) -> anyhow::Result<Overrides> {
    let path = match &ctx.overrides_file {
        Some(p) => p.clone(),
        None => {
            let p = dir.join(OVERRIDES_FILE);
            if !p.is_file() {
                return Ok(Overrides::empty());
            }
            p
        }
    };
    let text = fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
    Overrides::parse(&text).with_context(|| format!("load {path}"))
}

fn count_notice<'a>(keys: impl Iterator<Item = &'a ObjectKey>) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut total = 0usize;
    for key in keys {
        *counts.entry(key.kind.as_str()).or_default() += 1;
        total += 1;
    }
    let parts: Vec<String> = counts.iter().map(|(k, n)| format!("{k}={n}")).collect();
    if parts.is_empty() {
        format!("Found {total} objects")
    } else {
        format!("Found {total} objects: {}", parts.join(", "))
    }
}
