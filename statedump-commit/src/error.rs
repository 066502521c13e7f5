//! Error types for statedump-commit.
//!
//! Two classes, mirrored in the exit code:
//! - decision errors (exit code 2): the operator's decisions do not cover the
//!   plan, or explicitly refuse it. Nothing has been written.
//! - runtime errors (exit code 1): reading the source or writing the store
//!   failed. Objects written before the failure stay written.

use statedump_types::ObjectKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("conflicts without a resolution: {}", join(keys))]
    ConflictUnresolved { keys: Vec<ObjectKey> },

    #[error("objects without a secret: {}", join(keys))]
    MissingSecret { keys: Vec<ObjectKey> },

    #[error("import refused: conflict on {key} is resolved as fail")]
    Aborted { key: ObjectKey },

    #[error("failed to write {key} ({} object(s) already written)", applied.len())]
    ApplyFailed {
        key: ObjectKey,
        applied: Vec<ObjectKey>,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

impl CommitError {
    /// True when the store was not touched because of the decisions given.
    pub fn is_decision_error(&self) -> bool {
        matches!(
            self,
            CommitError::ConflictUnresolved { .. }
                | CommitError::MissingSecret { .. }
                | CommitError::Aborted { .. }
        )
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_decision_error() { 2 } else { 1 }
    }
}

fn join(keys: &[ObjectKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
