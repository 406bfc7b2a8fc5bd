use std::hash::Hash;

use ahash::AHashSet;
use tracing::info;

use crate::{
    detection::{DetectionId, FireDetection, NaturalKey},
    enrich::EnrichedTable,
};

/// A rule deciding which rows describe the same detection.
pub trait DuplicatePolicy {
    type Key: Eq + Hash;

    fn name(&self) -> &'static str;

    fn key(&self, detection: &FireDetection) -> Self::Key;
}

/// Rows sharing a stable identifier (join-induced duplicates).
#[derive(Debug, Clone, Copy, Default)]
pub struct ByIdentifier;

impl DuplicatePolicy for ByIdentifier {
    type Key = DetectionId;

    fn name(&self) -> &'static str { "identifier" }

    fn key(&self, detection: &FireDetection) -> DetectionId { detection.id.clone() }
}

/// Rows sharing (date, time, latitude, longitude) (source-induced duplicates).
#[derive(Debug, Clone, Copy, Default)]
pub struct ByNaturalKey;

impl DuplicatePolicy for ByNaturalKey {
    type Key = NaturalKey;

    fn name(&self) -> &'static str { "natural key" }

    fn key(&self, detection: &FireDetection) -> NaturalKey { detection.natural_key() }
}

/// The first row of every key group, and every later row.
#[derive(Debug, Clone)]
pub struct Partition {
    pub kept: EnrichedTable,
    pub removed: EnrichedTable,
}

/// Keep the first row per key in input order; everything else goes to `removed`, in order.
pub fn partition<P: DuplicatePolicy>(table: &EnrichedTable, policy: &P) -> Partition {
    let mut seen = AHashSet::with_capacity(table.len());
    let mut kept = Vec::with_capacity(table.len());
    let mut removed = Vec::new();
    for row in table.rows() {
        if seen.insert(policy.key(&row.detection)) {
            kept.push(row.clone());
        } else {
            removed.push(row.clone());
        }
    }
    let (kept, removed) = (table.with_rows(kept), table.with_rows(removed));
    info!(policy = policy.name(), kept = kept.len(), removed = removed.len(), "resolved duplicates");
    Partition { kept, removed }
}

/// Output of the join-induced pass.
#[derive(Debug, Clone)]
pub struct JoinDedup {
    /// One canonical row per identifier.
    pub clean: EnrichedTable,
    /// Rows collapsed into their canonical row; audit material.
    pub removed: EnrichedTable,
    /// Every enriched row, canonical and duplicate alike; territory counts use this one.
    pub with_duplicates: EnrichedTable,
}

/// Pass 1: collapse rows multiplied by overlapping territories.
pub fn resolve_join_duplicates(table: &EnrichedTable) -> JoinDedup {
    let Partition { kept, removed } = partition(table, &ByIdentifier);
    JoinDedup { clean: kept, removed, with_duplicates: table.clone() }
}

/// Output of the source-induced pass.
#[derive(Debug, Clone)]
pub struct SourceDedup {
    pub kept: EnrichedTable,
    pub removed: EnrichedTable,
}

impl SourceDedup {
    /// Identifiers of the discarded re-reports.
    pub fn removed_ids(&self) -> AHashSet<DetectionId> {
        self.removed.rows().iter().map(|row| row.detection.id.clone()).collect()
    }
}

/// Pass 2: drop detections the source reported again under a new identifier.
/// Expects one row per identifier (run it on the output of pass 1).
pub fn resolve_source_duplicates(table: &EnrichedTable) -> SourceDedup {
    let Partition { kept, removed } = partition(table, &ByNaturalKey);
    SourceDedup { kept, removed }
}

/// Both passes applied to one enriched table.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub clean: EnrichedTable,
    /// All rows of the surviving detections, join duplicates included.
    pub with_duplicates: EnrichedTable,
    pub join_removed: EnrichedTable,
    pub source_removed: EnrichedTable,
}

/// Run pass 1 then pass 2. Detections dropped by pass 2 leave the with-duplicates table too
/// (all of their rows), so they are never counted.
pub fn resolve(table: &EnrichedTable) -> Resolved {
    let JoinDedup { clean, removed: join_removed, with_duplicates } = resolve_join_duplicates(table);
    let source = resolve_source_duplicates(&clean);
    let with_duplicates = without_ids(&with_duplicates, &source.removed_ids());
    Resolved { clean: source.kept, with_duplicates, join_removed, source_removed: source.removed }
}

/// Rows whose detection identifier is not in `ids`.
pub(crate) fn without_ids(table: &EnrichedTable, ids: &AHashSet<DetectionId>) -> EnrichedTable {
    if ids.is_empty() {
        return table.clone();
    }
    table.filter(|row| !ids.contains(&row.detection.id))
}
