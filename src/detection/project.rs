use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    config::DetectionColumns,
    detection::{DetectionId, DetectionTable, FireDetection},
    errors::{FireError, Result},
    geom::{Crs, Reprojector},
};

/// Turns raw latitude/longitude records into detections positioned in the reference CRS.
pub struct GeometryProjector {
    reprojector: Reprojector,
    columns: DetectionColumns,
}

impl GeometryProjector {
    /// Fails fast if either coordinate system is undefined.
    pub fn new(source: Crs, reference: Crs, columns: DetectionColumns) -> Result<Self> {
        Ok(Self { reprojector: Reprojector::new(source, reference)?, columns })
    }

    #[inline] pub fn reference(&self) -> Crs { self.reprojector.target() }

    /// Project every valid record. Invalid records are logged and dropped; a missing required
    /// column fails the whole table. `date_diff` is measured from the latest date of the batch.
    pub fn project(&self, df: &DataFrame) -> Result<DetectionTable> {
        let ids = string_column(df, &self.columns.id)?;
        let dates = string_column(df, &self.columns.date)?;
        let times = string_column(df, &self.columns.time)?;
        let lats = float_column(df, &self.columns.latitude)?;
        let lons = float_column(df, &self.columns.longitude)?;

        let mut measurements = Vec::with_capacity(self.columns.measurements.len());
        for name in &self.columns.measurements {
            match df.column(name) {
                Ok(_) => measurements.push((name.as_str(), float_column(df, name)?)),
                Err(_) => debug!(column = %name, "measurement column absent"),
            }
        }

        let mut detections = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let record = RawRecord {
                row: i,
                id: ids.get(i),
                date: dates.get(i),
                time: times.get(i),
                latitude: lats.get(i),
                longitude: lons.get(i),
            };
            match self.project_record(&record) {
                Ok(mut detection) => {
                    for (name, values) in &measurements {
                        if let Some(value) = values.get(i) {
                            detection.measurements.insert(name.to_string(), value);
                        }
                    }
                    detections.push(detection);
                }
                Err(err) => warn!(error = %err, "dropping detection"),
            }
        }

        if let Some(latest) = detections.iter().map(|d| d.date).max() {
            for detection in &mut detections {
                detection.date_diff = (latest - detection.date).num_days();
            }
        }

        info!(input = df.height(), projected = detections.len(), crs = %self.reference(), "projected detections");
        Ok(DetectionTable::new(self.reference(), detections))
    }

    fn project_record(&self, record: &RawRecord<'_>) -> Result<FireDetection> {
        let invalid = |reason: &str| FireError::InputValidation {
            record: record.id.map_or_else(|| format!("row {}", record.row), str::to_string),
            reason: reason.to_string(),
        };

        let id = record.id.map(str::trim).filter(|id| !id.is_empty())
            .ok_or_else(|| invalid("missing identifier"))?;
        let latitude = record.latitude.filter(|v| v.is_finite() && v.abs() <= 90.0)
            .ok_or_else(|| invalid("missing or invalid latitude"))?;
        let longitude = record.longitude.filter(|v| v.is_finite() && v.abs() <= 180.0)
            .ok_or_else(|| invalid("missing or invalid longitude"))?;
        let date = record.date.and_then(parse_date).ok_or_else(|| invalid("missing or invalid date"))?;
        let time = record.time.and_then(parse_time).ok_or_else(|| invalid("missing or invalid time"))?;

        let position = self.reprojector.project(longitude, latitude)
            .map_err(|err| invalid(&err.to_string()))?;

        Ok(FireDetection {
            id: DetectionId::new(id),
            date,
            time,
            latitude,
            longitude,
            position,
            date_diff: 0,
            measurements: BTreeMap::new(),
        })
    }
}

struct RawRecord<'a> {
    row: usize,
    id: Option<&'a str>,
    date: Option<&'a str>,
    time: Option<&'a str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Give every record without an identifier a fresh UUID v4 (hex). Existing identifiers are kept,
/// so ingesting the same frame twice never reassigns them.
pub fn assign_identifiers(df: &DataFrame, column: &str) -> Result<DataFrame> {
    let fresh = || uuid::Uuid::new_v4().simple().to_string();

    let ids = match df.column(column) {
        Ok(existing) => {
            let existing = existing.cast(&DataType::String)?;
            existing.str()?.into_iter()
                .map(|id| match id.map(str::trim) {
                    Some(id) if !id.is_empty() => id.to_string(),
                    _ => fresh(),
                })
                .collect::<Vec<_>>()
        }
        Err(_) => (0..df.height()).map(|_| fresh()).collect(),
    };

    let mut out = df.clone();
    out.with_column(Column::new(column.into(), ids))?;
    Ok(out)
}

fn string_column(df: &DataFrame, name: &str) -> Result<StringChunked> {
    let column = df.column(name).map_err(|_| FireError::MissingColumn(name.to_string()))?;
    Ok(column.cast(&DataType::String)?.str()?.clone())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = df.column(name).map_err(|_| FireError::MissingColumn(name.to_string()))?;
    Ok(column.cast(&DataType::Float64)?.f64()?.clone())
}

/// ISO date, optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
        .or_else(|| raw.get(..10).and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()))
}

/// Either the satellite's `HHMM` digits (leading zeros may be lost, `512` is 05:12) or `HH:MM[:SS]`.
fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.len() <= 4 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveTime::parse_from_str(&format!("{raw:0>4}"), "%H%M").ok();
    }
    NaiveTime::parse_from_str(raw, "%H:%M:%S").ok()
        .or_else(|| NaiveTime::parse_from_str(raw, "%H:%M").ok())
}
