//! GeoJSON reading operations.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use serde_json::Value;
use tracing::warn;

use crate::{io::FeatureFields, territory::TerritoryFeature};

fn read_features(path: &Path) -> Result<Vec<Value>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("[io::geojson::read] Failed to read {}", path.display()))?;
    let mut value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("[io::geojson::read] Failed to parse GeoJSON {}", path.display()))?;
    match value.get_mut("features").map(Value::take) {
        Some(Value::Array(features)) => Ok(features),
        _ => bail!("[io::geojson::read] {} is not a FeatureCollection", path.display()),
    }
}

/// Parse a ring: `[[x, y], ...]`, closed if the source left it open.
fn parse_ring(value: &Value) -> Result<LineString<f64>> {
    let points = value.as_array().ok_or_else(|| anyhow!("ring must be an array"))?;
    let mut coords = points.iter()
        .map(|point| {
            let xy = point.as_array().filter(|xy| xy.len() >= 2)
                .ok_or_else(|| anyhow!("position must have two numbers"))?;
            let x = xy[0].as_f64().ok_or_else(|| anyhow!("x must be a number"))?;
            let y = xy[1].as_f64().ok_or_else(|| anyhow!("y must be a number"))?;
            Ok(Coord { x, y })
        })
        .collect::<Result<Vec<_>>>()?;
    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if first != last {
            coords.push(first);
        }
    }
    Ok(LineString(coords))
}

/// Parse polygon coordinates: `[exterior, hole, ...]`.
fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let rings = value.as_array().ok_or_else(|| anyhow!("polygon must be an array of rings"))?;
    let (exterior, holes) = rings.split_first().ok_or_else(|| anyhow!("polygon has no exterior ring"))?;
    Ok(Polygon::new(parse_ring(exterior)?, holes.iter().map(parse_ring).collect::<Result<_>>()?))
}

/// Polygon and MultiPolygon geometries; anything else is `None`.
fn parse_geometry(geometry: &Value) -> Result<Option<MultiPolygon<f64>>> {
    let coords = &geometry["coordinates"];
    match geometry["type"].as_str() {
        Some("Polygon") => Ok(Some(MultiPolygon::new(vec![parse_polygon(coords)?]))),
        Some("MultiPolygon") => {
            let polygons = coords.as_array().ok_or_else(|| anyhow!("MultiPolygon coordinates must be an array"))?;
            Ok(Some(MultiPolygon::new(polygons.iter().map(parse_polygon).collect::<Result<_>>()?)))
        }
        _ => Ok(None),
    }
}

/// Text of a property. Integral numbers lose their `.0`.
fn property_text(properties: &Value, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Load the territories of a layer from a GeoJSON FeatureCollection.
/// Features without a polygonal geometry are skipped.
pub fn read_territories(path: &Path, fields: &FeatureFields) -> Result<Vec<TerritoryFeature>> {
    let mut features = Vec::new();
    for (i, feature) in read_features(path)?.iter().enumerate() {
        let geometry = parse_geometry(&feature["geometry"])
            .with_context(|| format!("[io::geojson::read] Invalid geometry in feature {i} of {}", path.display()))?;
        let Some(geometry) = geometry else {
            warn!(path = %path.display(), feature = i, "skipping non-polygon feature");
            continue;
        };
        let properties = &feature["properties"];
        let code = fields.code.as_deref().and_then(|key| property_text(properties, key));
        let name = fields.name.as_deref().and_then(|key| property_text(properties, key));
        let mut territory = TerritoryFeature::new(code.as_deref(), name.as_deref(), geometry);
        for (key, field) in &fields.attributes {
            if let Some(value) = property_text(properties, field) {
                territory.attributes.insert(key.clone(), value);
            }
        }
        features.push(territory);
    }
    Ok(features)
}

/// Load a boundary as the union of every polygon of a GeoJSON FeatureCollection.
pub fn read_boundary(path: &Path) -> Result<MultiPolygon<f64>> {
    read_territories(path, &FeatureFields::default())?
        .into_iter()
        .map(|feature| feature.geometry)
        .reduce(|acc, shape| acc.union(&shape))
        .ok_or_else(|| anyhow!("[io::geojson::read] Boundary {} has no polygon", path.display()))
}
