use std::fmt;

use chrono::NaiveDate;
use polars::{frame::DataFrame, prelude::Column};

use crate::{config::DetectionColumns, enrich::EnrichedTable, errors::Result};

/// Which pass removed the rows of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DuplicatePass {
    Join,
    Source,
}

impl DuplicatePass {
    pub fn to_str(&self) -> &'static str {
        match self {
            DuplicatePass::Join => "join",
            DuplicatePass::Source => "source",
        }
    }
}

impl fmt::Display for DuplicatePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Rows removed by one pass over one table during one run. Entries are meant to be appended
/// to a log, never rewritten.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub run_date: NaiveDate,
    pub table: String,
    pub pass: DuplicatePass,
    pub removed: EnrichedTable,
}

impl AuditEntry {
    pub fn new(run_date: NaiveDate, table: &str, pass: DuplicatePass, removed: EnrichedTable) -> Self {
        Self { run_date, table: table.to_string(), pass, removed }
    }

    #[inline] pub fn is_empty(&self) -> bool { self.removed.is_empty() }

    /// The removed rows prefixed with run date, table and pass columns.
    pub fn to_frame(&self, columns: &DetectionColumns) -> Result<DataFrame> {
        let height = self.removed.len();
        let mut out = vec![
            Column::new("run_date".into(), vec![self.run_date.format("%Y-%m-%d").to_string(); height]),
            Column::new("table".into(), vec![self.table.as_str(); height]),
            Column::new("pass".into(), vec![self.pass.to_str(); height]),
        ];
        out.extend(self.removed.to_frame(columns)?.take_columns());
        Ok(DataFrame::new(out)?)
    }
}
