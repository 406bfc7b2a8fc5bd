use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{errors::{FireError, Result}, geom::Crs, territory::LayerKind};

/// Names of the input columns the projector reads from a raw detection table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionColumns {
    pub id: String,
    pub date: String,
    pub time: String,
    pub latitude: String,
    pub longitude: String,
    /// Numeric measurement columns carried through unchanged (brightness, radiative power, ...).
    pub measurements: Vec<String>,
}

impl Default for DetectionColumns {
    fn default() -> Self {
        Self {
            id: "uuid".into(),
            date: "acq_date".into(),
            time: "acq_time".into(),
            latitude: "latitude".into(),
            longitude: "longitude".into(),
            measurements: vec!["bright_ti4".into(), "bright_ti5".into(), "frp".into()],
        }
    }
}

/// One step of the multi-layer enrichment: which layer, and which of its attribute
/// columns travel with the territory code and name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerJoin {
    pub kind: LayerKind,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl LayerJoin {
    pub fn new(kind: LayerKind, columns: &[&str]) -> Self {
        Self { kind, columns: columns.iter().map(|s| s.to_string()).collect() }
    }
}

/// How long detections stay in the cumulative table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Keep detections from the reference date's calendar year.
    CalendarYear,
    /// Keep detections less than `n` days older than the reference date.
    Days(u32),
    /// Keep everything.
    Unbounded,
}

impl Default for Retention {
    fn default() -> Self { Retention::CalendarYear }
}

impl Retention {
    /// Whether a detection from `date` is still retained on `reference`.
    pub fn keeps(&self, date: NaiveDate, reference: NaiveDate) -> bool {
        match *self {
            Retention::CalendarYear => date.year() == reference.year(),
            Retention::Days(days) => (reference - date).num_days() < i64::from(days),
            Retention::Unbounded => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// CRS the raw latitude/longitude values are expressed in.
    #[serde(rename = "source_epsg")]
    pub source_crs: Crs,
    /// CRS shared by the boundary and every territory layer.
    #[serde(rename = "reference_epsg")]
    pub reference_crs: Crs,
    pub columns: DetectionColumns,
    /// Enrichment order; also the set of layers aggregated.
    pub layers: Vec<LayerJoin>,
    /// Side of a grid tile, in degrees.
    pub grid_cell_degrees: f64,
    pub retention: Retention,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_crs: Crs::WGS84,
            reference_crs: Crs::SIRGAS2000,
            columns: DetectionColumns::default(),
            layers: vec![
                LayerJoin::new(LayerKind::City, &["state_code", "state"]),
                LayerJoin::new(LayerKind::IndigenousLand, &["ethnicity"]),
                LayerJoin::new(LayerKind::ProtectedArea, &["category", "creation_year", "sphere"]),
                LayerJoin::new(LayerKind::Biome, &[]),
                LayerJoin::new(LayerKind::Grid, &[]),
            ],
            grid_cell_degrees: 0.18,
            retention: Retention::CalendarYear,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject configurations no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if !(self.grid_cell_degrees.is_finite() && self.grid_cell_degrees > 0.0) {
            return Err(FireError::Config(format!("grid cell size must be positive, got {}", self.grid_cell_degrees)));
        }
        for (i, join) in self.layers.iter().enumerate() {
            if self.layers[..i].iter().any(|other| other.kind == join.kind) {
                return Err(FireError::Config(format!("layer {} is joined twice", join.kind)));
            }
        }
        Ok(())
    }
}
