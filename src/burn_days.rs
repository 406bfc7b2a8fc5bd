//! Consecutive burn days: how many days in a row, counting back from a reference date,
//! a territory has had at least one detection.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use chrono::NaiveDate;
use tracing::debug;

use crate::{enrich::EnrichedTable, territory::{LayerKind, TerritoryCode}};

/// Walk back one day at a time from `today` (inclusive) while the day has a detection.
/// Today missing from the history, or an empty history, yields zero.
pub fn consecutive_burn_days<I>(dates: I, today: NaiveDate) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let dates = dates.into_iter().collect::<AHashSet<_>>();
    let mut tally = 0;
    let mut day = Some(today);
    while let Some(d) = day.filter(|d| dates.contains(d)) {
        tally += 1;
        day = d.pred_opt();
    }
    tally
}

/// Burn days of every territory of `layer` with at least one detection in `table`.
/// Each territory only sees its own history; rows outside the layer are ignored.
pub fn burn_days_by_territory(table: &EnrichedTable, layer: LayerKind, today: NaiveDate) -> BTreeMap<TerritoryCode, u32> {
    let Some(idx) = table.schema().code_index(layer) else { return BTreeMap::new() };

    let mut history: AHashMap<&str, AHashSet<NaiveDate>> = AHashMap::new();
    for row in table.rows() {
        if let Some(code) = row.value(idx) {
            history.entry(code).or_default().insert(row.detection.date);
        }
    }
    debug!(layer = %layer, territories = history.len(), %today, "computing burn days");

    history.into_iter()
        .map(|(code, dates)| (TerritoryCode::from(code), consecutive_burn_days(dates, today)))
        .collect()
}
