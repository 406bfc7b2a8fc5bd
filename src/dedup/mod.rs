//! Duplicate resolution.
//!
//! Two passes run in a fixed order. The first collapses rows multiplied by overlapping
//! territories of one layer (keyed on the detection identifier) and keeps the extra rows
//! for territory counting. The second drops detections re-reported by the source under
//! a new identifier (keyed on date, time and position); those are discarded outright.

mod audit;
mod policy;

pub use audit::{AuditEntry, DuplicatePass};
pub use policy::{
    partition, resolve, resolve_join_duplicates, resolve_source_duplicates, ByIdentifier, ByNaturalKey,
    DuplicatePolicy, JoinDedup, Partition, Resolved, SourceDedup,
};
pub(crate) use policy::without_ids;
