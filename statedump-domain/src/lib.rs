//! Domain logic: turn a staged statedump directory + store state into a
//! deterministic import plan.
//!
//! This crate owns *what* would be imported and which decisions that needs.
//! It does not write anything; that's the `statedump-commit` crate.

mod descriptor;
mod overrides;
mod planner;
mod ports;
mod properties;

pub use descriptor::{DescriptorError, ObjectDescriptor, fingerprint, parse_object_xml, substitute};
pub use overrides::{OVERRIDES_FILE, Overrides};
pub use planner::{LoadedDump, PlanContext, Planner};
pub use ports::{ConfigurationStore, MemoryStore, StoreView};
pub use properties::{PropertiesError, parse_properties};
