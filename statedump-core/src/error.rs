use crate::ports::Permission;
use statedump_commit::CommitError;
use statedump_unpack::UnpackError;
use thiserror::Error;

/// Error type for orchestrator calls. Exit code 2 = refused, 1 = failed.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{principal:?} is not authorized to {permission}")]
    Unauthorized {
        principal: String,
        permission: Permission,
    },

    #[error("statedump import is locked down")]
    Locked,

    #[error("invalid template name {name:?}")]
    InvalidTemplate { name: String },

    #[error("unpack failed")]
    Unpack(#[from] UnpackError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ImportError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ImportError::Unauthorized { .. }
            | ImportError::Locked
            | ImportError::InvalidTemplate { .. } => 2,
            ImportError::Commit(e) => e.exit_code(),
            ImportError::Unpack(_) | ImportError::Internal(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusals_exit_2() {
        assert_eq!(ImportError::Locked.exit_code(), 2);
        let err = ImportError::Unauthorized {
            principal: "mallory".into(),
            permission: Permission::Lockdown,
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.to_string(),
            "\"mallory\" is not authorized to lock down statedump import"
        );
    }

    #[test]
    fn commit_errors_keep_their_class() {
        let err = ImportError::from(CommitError::Aborted {
            key: "role/a".parse().unwrap(),
        });
        assert_eq!(err.exit_code(), 2);
        let err = ImportError::from(CommitError::from(anyhow::anyhow!("io")));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn unpack_errors_exit_1() {
        let err = ImportError::from(UnpackError::EmptyArchive);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "unpack failed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
