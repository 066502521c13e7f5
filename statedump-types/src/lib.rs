//! Shared DTOs (schemas-as-code) for the statedump workspace.
//!
//! # Design constraints
//! - Plans, decisions, and results are exchanged as JSON between `plan` and `commit`.
//! - Plans carry no timestamps or random ids, so equal inputs give equal plans.
//! - Prefer adding optional fields over changing semantics.

pub mod decisions;
pub mod keys;
pub mod object;
pub mod plan;
pub mod result;

pub use decisions::{Decisions, Resolution, Secret};
pub use keys::{KeyParseError, ObjectKey, ObjectKind};
pub use object::StoredObject;
pub use plan::{ConflictEntry, ImportPlan, PasswordRequirement, PlanSummary, PlannedObject};
pub use result::{AppliedObject, ImportResult, ObjectStatus, ResultSummary};

/// Schema identifiers.
pub mod schema {
    pub const STATEDUMP_PLAN_V1: &str = "statedump.plan.v1";
    pub const STATEDUMP_DECISIONS_V1: &str = "statedump.decisions.v1";
    pub const STATEDUMP_RESULT_V1: &str = "statedump.result.v1";
}
