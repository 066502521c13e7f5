use crate::keys::ObjectKey;
use serde::{Deserialize, Serialize};

/// Read-only outcome of a dry run.
///
/// Lists every decision a later commit needs. Contains nothing
/// time-dependent, so planning the same source against the same store twice
/// yields equal values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPlan {
    pub schema: String,

    #[serde(default)]
    pub objects: Vec<PlannedObject>,

    #[serde(default)]
    pub conflicts: Vec<ConflictEntry>,

    #[serde(default)]
    pub passwords_needed: Vec<PasswordRequirement>,

    #[serde(default)]
    pub notices: Vec<String>,

    pub summary: PlanSummary,
}

impl ImportPlan {
    pub fn new() -> Self {
        Self {
            schema: crate::schema::STATEDUMP_PLAN_V1.to_string(),
            objects: vec![],
            conflicts: vec![],
            passwords_needed: vec![],
            notices: vec![],
            summary: PlanSummary::default(),
        }
    }

    /// True when a commit needs no operator input at all.
    pub fn is_unattended(&self) -> bool {
        self.conflicts.is_empty() && self.passwords_needed.is_empty()
    }
}

impl Default for ImportPlan {
    fn default() -> Self {
        Self::new()
    }
}

/// One object the import would write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedObject {
    pub key: ObjectKey,
    pub source_file: String,
    /// sha256 over the object's resolved fields.
    pub fingerprint: String,
    pub conflict: bool,
    pub needs_secret: bool,
}

/// An incoming object whose identity already exists in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub key: ObjectKey,
    pub source_file: String,
    pub stored_fingerprint: String,
    pub incoming_fingerprint: String,
}

impl ConflictEntry {
    /// Whether overwriting would change the stored content.
    pub fn differs(&self) -> bool {
        self.stored_fingerprint != self.incoming_fingerprint
    }
}

/// An incoming object that is unusable until the operator provides a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordRequirement {
    pub key: ObjectKey,
    pub source_file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub objects_total: u64,
    pub conflicts: u64,
    pub passwords_needed: u64,
    pub files_ignored: u64,
}
