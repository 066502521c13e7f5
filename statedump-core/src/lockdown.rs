//! One-way import latch.
//!
//! Once engaged, every further import is refused for the lifetime of the
//! persisted configuration. Nothing in this crate can clear it.

use crate::ports::LockdownStore;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockdownState {
    Unlocked,
    Locked,
}

pub struct Lockdown {
    locked: AtomicBool,
    store: Box<dyn LockdownStore + Send + Sync>,
}

impl fmt::Debug for Lockdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lockdown")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Lockdown {
    /// Read the persisted flag.
    pub fn load(store: Box<dyn LockdownStore + Send + Sync>) -> anyhow::Result<Self> {
        let locked = store.load()?;
        Ok(Self {
            locked: AtomicBool::new(locked),
            store,
        })
    }

    pub fn state(&self) -> LockdownState {
        if self.locked.load(Ordering::SeqCst) {
            LockdownState::Locked
        } else {
            LockdownState::Unlocked
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state() == LockdownState::Locked
    }

    /// True while imports are still accepted.
    pub fn is_available(&self) -> bool {
        !self.is_locked()
    }

    /// Persist `Locked`, then flip the in-memory flag. No-op when already
    /// locked. If persisting fails the latch stays open.
    pub fn engage(&self) -> anyhow::Result<()> {
        if self.is_locked() {
            return Ok(());
        }
        self.store.persist_locked()?;
        self.locked.store(true, Ordering::SeqCst);
        info!("statedump import locked down");
        Ok(())
    }
}
