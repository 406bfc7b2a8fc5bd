use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::{NaiveDate, NaiveTime};
use geo::Point;

/// Stable identifier of a detection, assigned once at ingestion and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DetectionId(Arc<str>);

impl DetectionId {
    pub fn new(id: &str) -> Self { Self(Arc::from(id)) }

    #[inline] pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DetectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The tuple identifying one physical event at the source, whatever identifier it was given.
/// Coordinates are compared bitwise (with -0.0 folded into 0.0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    date: NaiveDate,
    time: NaiveTime,
    latitude: u64,
    longitude: u64,
}

/// One satellite fire observation. Immutable once projected.
#[derive(Debug, Clone, PartialEq)]
pub struct FireDetection {
    pub id: DetectionId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub latitude: f64,
    pub longitude: f64,
    /// Position in the reference CRS (x = lon, y = lat).
    pub position: Point<f64>,
    /// Days between this detection and the latest detection of its ingestion batch.
    pub date_diff: i64,
    pub measurements: BTreeMap<String, f64>, // bright_ti4, bright_ti5, frp, ...
}

impl FireDetection {
    /// A detection whose position is its own lon/lat (no reprojection).
    pub fn new(id: &str, date: NaiveDate, time: NaiveTime, latitude: f64, longitude: f64) -> Self {
        Self {
            id: DetectionId::new(id),
            date,
            time,
            latitude,
            longitude,
            position: Point::new(longitude, latitude),
            date_diff: 0,
            measurements: BTreeMap::new(),
        }
    }

    pub fn with_measurement(mut self, name: &str, value: f64) -> Self {
        self.measurements.insert(name.to_string(), value);
        self
    }

    /// Key of the source-induced duplicate policy: (date, time, latitude, longitude).
    pub fn natural_key(&self) -> NaturalKey {
        #[inline] fn bits(v: f64) -> u64 { if v == 0.0 { 0 } else { v.to_bits() } }
        NaturalKey {
            date: self.date,
            time: self.time,
            latitude: bits(self.latitude),
            longitude: bits(self.longitude),
        }
    }
}
