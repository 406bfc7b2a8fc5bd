use std::fmt;

use crate::enrich::EnrichedTable;

/// Aggregation periods. Each one is counted from its own point table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeWindow {
    Last24h,
    Last7d,
    Cumulative,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [TimeWindow::Last24h, TimeWindow::Last7d, TimeWindow::Cumulative];

    pub fn to_str(&self) -> &'static str {
        match self {
            TimeWindow::Last24h => "24h",
            TimeWindow::Last7d => "7d",
            TimeWindow::Cumulative => "cumulative",
        }
    }

    /// Name of the fire count column of this window in aggregated tables.
    pub fn count_column(&self) -> &'static str {
        match self {
            TimeWindow::Last24h => "fires_24h",
            TimeWindow::Last7d => "fires_7d",
            TimeWindow::Cumulative => "fires_cumulative",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// The two published variants of one window's enriched detections.
#[derive(Debug, Clone)]
pub struct WindowTables {
    /// One row per detection.
    pub clean: EnrichedTable,
    /// Every enriched row of the retained detections, join duplicates included.
    pub with_duplicates: EnrichedTable,
}

/// The three point tables an aggregation run consumes (with-duplicates variants).
#[derive(Debug, Clone, Copy)]
pub struct WindowSet<'a> {
    pub last_24h: &'a EnrichedTable,
    pub last_7d: &'a EnrichedTable,
    pub cumulative: &'a EnrichedTable,
}

impl<'a> WindowSet<'a> {
    /// The with-duplicates tables of each window, which is what territory counts read.
    pub fn with_duplicates(last_24h: &'a WindowTables, last_7d: &'a WindowTables, cumulative: &'a WindowTables) -> Self {
        Self {
            last_24h: &last_24h.with_duplicates,
            last_7d: &last_7d.with_duplicates,
            cumulative: &cumulative.with_duplicates,
        }
    }

    #[inline] pub fn get(&self, window: TimeWindow) -> &'a EnrichedTable {
        match window {
            TimeWindow::Last24h => self.last_24h,
            TimeWindow::Last7d => self.last_7d,
            TimeWindow::Cumulative => self.cumulative,
        }
    }
}
