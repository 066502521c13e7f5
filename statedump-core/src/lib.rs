//! Embeddable core library for statedump imports.
//!
//! Provides a clap-free, I/O-abstracted entry point suitable for linking
//! into an admin service or other host process.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`Authorizer`](ports::Authorizer): may this principal import or lock down?
//! - [`ConfigurationStore`](ports::ConfigurationStore): the live configuration
//! - [`LockdownStore`](ports::LockdownStore): where the lockdown flag is persisted
//! - [`ConfigCache`](ports::ConfigCache): caches to drop after a change
//!
//! The [`adapters`] module provides default filesystem-backed and in-memory
//! implementations.
//!
//! # Entry point
//!
//! [`Importer`](orchestrator::Importer): dry run, commit, lockdown.

pub mod adapters;
pub mod error;
pub mod lockdown;
pub mod orchestrator;
pub mod ports;
pub mod settings;

pub use error::ImportError;
pub use lockdown::{Lockdown, LockdownState};
pub use orchestrator::{ImportSource, Importer, TemplateInfo};
pub use settings::{ImportOptions, ImportSettings};

// Re-export the plan/decision types so embedders don't need statedump-types directly.
pub use statedump_types::{Decisions, ImportPlan, ImportResult, Resolution, Secret};
