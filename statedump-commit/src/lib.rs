//! Import executor.
//!
//! Responsibilities:
//! - Re-plan the staged directory against the current store.
//! - Check the operator's decisions against that plan before any write.
//! - Write objects in plan order, merging where the kind calls for it.

mod error;

pub use error::CommitError;

use camino::Utf8Path;
use statedump_domain::{ConfigurationStore, LoadedDump, PlanContext, Planner, StoreView};
use statedump_types::{
    AppliedObject, Decisions, ImportPlan, ObjectKey, ObjectStatus, Resolution, StoredObject,
};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CommitOptions {
    /// Merge an overwritten crypto token into the stored one instead of
    /// replacing it, so stored-only fields survive.
    pub merge_crypto_tokens: bool,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            merge_crypto_tokens: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// The plan the commit was checked against.
    pub plan: ImportPlan,
    pub applied: Vec<AppliedObject>,
    pub notices: Vec<String>,
}

/// Plan `dir` against `store`, check `decisions`, then write.
pub fn commit(
    dir: &Utf8Path,
    ctx: &PlanContext,
    decisions: &Decisions,
    opts: &CommitOptions,
    store: &mut dyn ConfigurationStore,
) -> Result<CommitOutcome, CommitError> {
    let planner = Planner::new();
    let dump = planner.load(dir, ctx)?;
    let plan = planner.plan_loaded(&dump, &*store)?;
    check_decisions(&plan, decisions)?;
    apply(dump, plan, decisions, opts, store)
}

/// Fail unless every conflict is resolved, every requirement has a secret,
/// and no conflict is resolved as [`Resolution::Fail`].
pub fn check_decisions(plan: &ImportPlan, decisions: &Decisions) -> Result<(), CommitError> {
    let keys = decisions.missing_resolutions(plan);
    if !keys.is_empty() {
        return Err(CommitError::ConflictUnresolved { keys });
    }

    let keys = decisions.missing_secrets(plan);
    if !keys.is_empty() {
        return Err(CommitError::MissingSecret { keys });
    }

    for conflict in &plan.conflicts {
        if decisions.resolutions.get(&conflict.key) == Some(&Resolution::Fail) {
            return Err(CommitError::Aborted {
                key: conflict.key.clone(),
            });
        }
    }
    Ok(())
}

fn apply(
    dump: LoadedDump,
    plan: ImportPlan,
    decisions: &Decisions,
    opts: &CommitOptions,
    store: &mut dyn ConfigurationStore,
) -> Result<CommitOutcome, CommitError> {
    let mut applied: Vec<AppliedObject> = Vec::new();
    let mut written: Vec<ObjectKey> = Vec::new();
    let mut notices = plan.notices.clone();

    for (descriptor, planned) in dump.descriptors.iter().zip(&plan.objects) {
        let key = &descriptor.key;
        let mut incoming = descriptor.to_stored();
        if planned.needs_secret {
            incoming.secret = decisions.secrets.get(key).cloned();
        }

        let status = if key.kind.is_replacements() {
            merge_or_save(store, incoming)
        } else if planned.conflict {
            match decisions.resolutions.get(key) {
                Some(Resolution::Overwrite) => {
                    if key.kind.is_crypto_token() && opts.merge_crypto_tokens {
                        merge_or_save(store, incoming)
                    } else {
                        store.save(&incoming).map(|()| ObjectStatus::Applied)
                    }
                }
                Some(Resolution::Skip) => Ok(ObjectStatus::Skipped),
                Some(Resolution::Fail) => return Err(CommitError::Aborted { key: key.clone() }),
                None => {
                    return Err(CommitError::ConflictUnresolved {
                        keys: vec![key.clone()],
                    });
                }
            }
        } else {
            store.save(&incoming).map(|()| ObjectStatus::Applied)
        };

        let status = status.map_err(|source| CommitError::ApplyFailed {
            key: key.clone(),
            applied: written.clone(),
            source,
        })?;

        match status {
            ObjectStatus::Skipped => debug!(key = %key, "kept stored object"),
            _ => {
                info!(key = %key, status = status.label(), "wrote object");
                written.push(key.clone());
            }
        }
        notices.push(format!("{} {key}", status_verb(status)));
        applied.push(AppliedObject {
            key: key.clone(),
            status,
        });
    }

    Ok(CommitOutcome {
        plan,
        applied,
        notices,
    })
}

fn merge_or_save(
    store: &mut dyn ConfigurationStore,
    incoming: StoredObject,
) -> anyhow::Result<ObjectStatus> {
    match store.get(&incoming.key)? {
        Some(mut stored) => {
            stored.merge_from(incoming);
            store.save(&stored)?;
            Ok(ObjectStatus::Merged)
        }
        None => {
            store.save(&incoming)?;
            Ok(ObjectStatus::Applied)
        }
    }
}

fn status_verb(status: ObjectStatus) -> &'static str {
    match status {
        ObjectStatus::Applied => "Applied",
        ObjectStatus::Merged => "Merged",
        ObjectStatus::Skipped => "Skipped",
    }
}
