//! CSV writing operations.

use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{ensure, Context, Result};
use polars::{frame::DataFrame, io::SerWriter, prelude::CsvWriter};

/// Write a DataFrame to a CSV file, replacing it.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[io::csv::write] Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(file)
        .finish(df)
        .with_context(|| format!("[io::csv::write] Failed to write CSV to {:?}", path))
}

/// Append rows to a CSV log. A missing or empty file gets a header first; an existing
/// file must have exactly the DataFrame's columns.
pub fn append_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let header = df.get_column_names().iter().map(|name| name.as_str()).collect::<Vec<_>>().join(",");

    let existing = match File::open(path) {
        Ok(file) => BufReader::new(file).lines().next().transpose()
            .with_context(|| format!("[io::csv::write] Failed to read header of {}", path.display()))?,
        Err(_) => None,
    };

    match existing {
        Some(line) if !line.is_empty() => {
            ensure!(
                line.trim_end() == header,
                "[io::csv::write] Columns of {} do not match the appended rows", path.display()
            );
            let file = OpenOptions::new().append(true).open(path)
                .with_context(|| format!("[io::csv::write] Failed to open {} for appending", path.display()))?;
            CsvWriter::new(file)
                .include_header(false)
                .finish(df)
                .with_context(|| format!("[io::csv::write] Failed to append CSV to {:?}", path))
        }
        _ => write_csv(df, path),
    }
}
