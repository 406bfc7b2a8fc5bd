//! Maintenance of the cumulative tables: the running archive of every retained detection.

use ahash::AHashSet;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::{
    aggregate::WindowTables,
    config::Retention,
    dedup::{resolve_source_duplicates, without_ids},
    enrich::EnrichedTable,
    errors::Result,
};

/// The new cumulative tables and what was left out of them.
#[derive(Debug, Clone)]
pub struct ArchiveUpdate {
    pub tables: WindowTables,
    /// Fresh detections already reported under another identifier; audit material.
    pub source_removed: EnrichedTable,
    /// Detections of the clean table dropped by retention.
    pub expired: usize,
}

/// Append freshly fetched tables to the archive.
///
/// Fresh detections whose identifier is already archived are skipped. Both tables are then
/// cut to the retention window, and re-reports of archived events are dropped from the clean
/// table (first occurrence wins) along with all of their rows in the with-duplicates table.
/// Inputs are never modified.
pub fn update_cumulative(
    previous: &WindowTables,
    fresh: &WindowTables,
    retention: Retention,
    reference: NaiveDate,
) -> Result<ArchiveUpdate> {
    let archived = previous.clean.rows().iter()
        .map(|row| row.detection.id.clone())
        .collect::<AHashSet<_>>();
    let fresh_clean = without_ids(&fresh.clean, &archived);
    let fresh_dups = without_ids(&fresh.with_duplicates, &archived);
    if fresh_clean.len() < fresh.clean.len() {
        debug!(skipped = fresh.clean.len() - fresh_clean.len(), "fresh detections already archived");
    }

    let retained = |table: &EnrichedTable| table.filter(|row| retention.keeps(row.detection.date, reference));
    let clean = previous.clean.concat(&fresh_clean)?;
    let with_duplicates = previous.with_duplicates.concat(&fresh_dups)?;
    let (before, clean, with_duplicates) = (clean.len(), retained(&clean), retained(&with_duplicates));
    let expired = before - clean.len();

    let source = resolve_source_duplicates(&clean);
    let with_duplicates = without_ids(&with_duplicates, &source.removed_ids());

    info!(
        archived = source.kept.len(),
        added = fresh_clean.len(),
        expired,
        re_reported = source.removed.len(),
        "updated cumulative tables",
    );
    Ok(ArchiveUpdate {
        tables: WindowTables { clean: source.kept, with_duplicates },
        source_removed: source.removed,
        expired,
    })
}
