use crate::keys::ObjectKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub schema: String,
    pub run_id: Uuid,

    /// Short digest of the uploaded archive, for cross-checking against a
    /// ceremony script. Not a security property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    #[serde(default)]
    pub applied: Vec<AppliedObject>,

    #[serde(default)]
    pub notices: Vec<String>,

    pub summary: ResultSummary,

    #[serde(default)]
    pub lockdown_engaged: bool,

    pub finished_at: DateTime<Utc>,
}

impl ImportResult {
    pub fn new(applied: Vec<AppliedObject>, notices: Vec<String>) -> Self {
        let summary = ResultSummary::from_applied(&applied);
        Self {
            schema: crate::schema::STATEDUMP_RESULT_V1.to_string(),
            run_id: Uuid::new_v4(),
            source_id: None,
            applied,
            notices,
            summary,
            lockdown_engaged: false,
            finished_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedObject {
    pub key: ObjectKey,
    pub status: ObjectStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    Applied,
    Merged,
    Skipped,
}

impl ObjectStatus {
    pub fn label(self) -> &'static str {
        match self {
            ObjectStatus::Applied => "applied",
            ObjectStatus::Merged => "merged",
            ObjectStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub applied: u64,
    pub merged: u64,
    pub skipped: u64,
}

impl ResultSummary {
    pub fn from_applied(applied: &[AppliedObject]) -> Self {
        let mut summary = Self::default();
        for a in applied {
            match a.status {
                ObjectStatus::Applied => summary.applied += 1,
                ObjectStatus::Merged => summary.merged += 1,
                ObjectStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}
