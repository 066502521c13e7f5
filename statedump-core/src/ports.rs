//! Port traits abstracting all I/O away from the orchestrator.

use std::fmt;

pub use statedump_domain::{ConfigurationStore, StoreView};

/// What a principal is asking to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Dry run, commit, and listing templates.
    Import,
    Lockdown,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Permission::Import => "import statedumps",
            Permission::Lockdown => "lock down statedump import",
        })
    }
}

/// Access check, consulted before anything else happens.
pub trait Authorizer {
    fn is_authorized(&self, principal: &str, permission: Permission) -> bool;
}

/// Persistence for the lockdown flag.
pub trait LockdownStore {
    fn load(&self) -> anyhow::Result<bool>;

    /// Record the locked state durably. Must be idempotent.
    fn persist_locked(&self) -> anyhow::Result<()>;
}

/// Caches that must be dropped after the configuration changed.
pub trait ConfigCache {
    fn invalidate(&self) -> anyhow::Result<()>;
}
