use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use polars::{frame::DataFrame, prelude::Column};

use crate::{
    config::DetectionColumns,
    detection::FireDetection,
    errors::{FireError, Result},
    geom::{point_wkt, Crs},
};

/// An ordered batch of detections sharing one coordinate reference.
/// Rows are shared, so filtering and concatenating never copy a detection.
#[derive(Debug, Clone, Default)]
pub struct DetectionTable {
    crs: Crs,
    rows: Vec<Arc<FireDetection>>,
}

impl DetectionTable {
    pub fn new(crs: Crs, detections: Vec<FireDetection>) -> Self {
        Self { crs, rows: detections.into_iter().map(Arc::new).collect() }
    }

    pub(crate) fn from_rows(crs: Crs, rows: Vec<Arc<FireDetection>>) -> Self {
        Self { crs, rows }
    }

    #[inline] pub fn crs(&self) -> Crs { self.crs }

    #[inline] pub fn len(&self) -> usize { self.rows.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    #[inline] pub(crate) fn rows(&self) -> &[Arc<FireDetection>] { &self.rows }

    pub fn iter(&self) -> impl Iterator<Item = &FireDetection> + '_ {
        self.rows.iter().map(Arc::as_ref)
    }

    /// A new table with the rows matching `keep`, in order.
    pub fn filter<F>(&self, keep: F) -> Self
    where
        F: Fn(&FireDetection) -> bool,
    {
        let rows = self.rows.iter().filter(|row| keep(row)).cloned().collect();
        Self { crs: self.crs, rows }
    }

    /// Rows of `self` followed by rows of `other`. Both tables must share a CRS.
    pub fn concat(&self, other: &DetectionTable) -> Result<Self> {
        if self.crs != other.crs {
            return Err(FireError::CoordinateMismatch {
                layer: "detections".into(),
                expected: self.crs.epsg(),
                found: other.crs.epsg(),
            });
        }
        let mut rows = Vec::with_capacity(self.len() + other.len());
        rows.extend(self.rows.iter().cloned());
        rows.extend(other.rows.iter().cloned());
        Ok(Self { crs: self.crs, rows })
    }

    /// The most recent detection date, if any.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|row| row.date).max()
    }

    /// Export the detection columns, named as in `columns`.
    pub fn to_frame(&self, columns: &DetectionColumns) -> Result<DataFrame> {
        let rows = self.iter().collect::<Vec<_>>();
        Ok(DataFrame::new(detection_columns(&rows, columns))?)
    }
}

/// Column set shared by every exported point table: identifier, date and time fields,
/// position, measurements, then the WKT geometry.
pub(crate) fn detection_columns(rows: &[&FireDetection], columns: &DetectionColumns) -> Vec<Column> {
    let mut out = vec![
        Column::new(columns.id.as_str().into(), rows.iter().map(|d| d.id.as_str()).collect::<Vec<_>>()),
        Column::new(
            columns.date.as_str().into(),
            rows.iter().map(|d| d.date.format("%Y-%m-%d").to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            columns.time.as_str().into(),
            rows.iter().map(|d| d.time.format("%H:%M").to_string()).collect::<Vec<_>>(),
        ),
        Column::new("day".into(), rows.iter().map(|d| d.date.day()).collect::<Vec<_>>()),
        Column::new("month".into(), rows.iter().map(|d| d.date.month()).collect::<Vec<_>>()),
        Column::new("year".into(), rows.iter().map(|d| d.date.year()).collect::<Vec<_>>()),
        Column::new("date_diff".into(), rows.iter().map(|d| d.date_diff).collect::<Vec<_>>()),
        Column::new(columns.latitude.as_str().into(), rows.iter().map(|d| d.latitude).collect::<Vec<_>>()),
        Column::new(columns.longitude.as_str().into(), rows.iter().map(|d| d.longitude).collect::<Vec<_>>()),
    ];
    for name in &columns.measurements {
        out.push(Column::new(
            name.as_str().into(),
            rows.iter().map(|d| d.measurements.get(name).copied()).collect::<Vec<_>>(),
        ));
    }
    out.push(Column::new("geometry".into(), rows.iter().map(|d| point_wkt(&d.position)).collect::<Vec<_>>()));
    out
}
