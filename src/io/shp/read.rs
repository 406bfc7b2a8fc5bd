//! Shapefile reading operations.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use geo::{BooleanOps, MultiPolygon};
use shapefile::{dbase::{FieldValue, Record}, Reader, Shape};
use tracing::{debug, warn};

use super::polygon::shp_to_geo;
use crate::{io::FeatureFields, territory::TerritoryFeature};

/// Reads all polygon shapes and their attribute records from a `.shp` file (with its `.dbf`).
/// Non-polygon shapes are skipped.
fn read_polygons(path: &Path) -> Result<Vec<(MultiPolygon<f64>, Record)>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[io::shp::read] Failed to open shapefile: {}", path.display()))?;

    let mut items = Vec::with_capacity(reader.shape_count()?);
    for (i, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result
            .with_context(|| format!("[io::shp::read] Error reading shape {i} of {}", path.display()))?;
        match shape {
            Shape::Polygon(polygon) => items.push((shp_to_geo(&polygon), record)),
            Shape::NullShape => debug!(path = %path.display(), shape = i, "null shape"),
            other => warn!(path = %path.display(), shape = i, kind = ?other.shapetype(), "skipping non-polygon shape"),
        }
    }
    Ok(items)
}

/// Text of a field, whatever its dBase type. Integral numbers lose their `.0`.
fn field_text(record: &Record, field: &str) -> Option<String> {
    fn number(n: f64) -> String {
        if n.fract() == 0.0 && n.abs() < 1e15 { format!("{}", n as i64) } else { n.to_string() }
    }

    match record.get(field)? {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        FieldValue::Numeric(Some(n)) => Some(number(*n)),
        FieldValue::Float(Some(n)) => Some(number(f64::from(*n))),
        FieldValue::Double(n) => Some(number(*n)),
        FieldValue::Integer(n) => Some(n.to_string()),
        FieldValue::Logical(Some(b)) => Some(b.to_string()),
        _ => None,
    }
}

/// Load the territories of a layer from a `.shp` file.
pub fn read_territories(path: &Path, fields: &FeatureFields) -> Result<Vec<TerritoryFeature>> {
    let items = read_polygons(path)?;
    let features = items.into_iter()
        .map(|(geometry, record)| {
            let mut feature = TerritoryFeature::new(
                fields.code.as_deref().and_then(|field| field_text(&record, field)).as_deref(),
                fields.name.as_deref().and_then(|field| field_text(&record, field)).as_deref(),
                geometry,
            );
            for (key, field) in &fields.attributes {
                if let Some(value) = field_text(&record, field) {
                    feature.attributes.insert(key.clone(), value);
                }
            }
            feature
        })
        .collect::<Vec<_>>();
    debug!(path = %path.display(), territories = features.len(), "read territory shapefile");
    Ok(features)
}

/// Load a boundary as the union of every polygon of a `.shp` file.
pub fn read_boundary(path: &Path) -> Result<MultiPolygon<f64>> {
    let items = read_polygons(path)?;
    if items.is_empty() {
        bail!("[io::shp::read] Boundary shapefile {} has no polygon", path.display());
    }
    items.into_iter()
        .map(|(shape, _)| shape)
        .reduce(|acc, shape| acc.union(&shape))
        .ok_or_else(|| anyhow!("[io::shp::read] Boundary shapefile {} has no polygon", path.display()))
}
