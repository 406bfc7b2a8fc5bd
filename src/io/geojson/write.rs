//! GeoJSON writing operations.

use std::path::Path;

use anyhow::{Context, Result};
use geo::MultiPolygon;
use serde_json::{json, Map, Value};

use crate::aggregate::{LandAggregate, TimeWindow};

/// GeoJSON geometry of a MultiPolygon: one `[exterior, hole, ...]` ring list per polygon.
fn multipolygon_to_geojson(mp: &MultiPolygon<f64>) -> Value {
    let ring = |ls: &geo::LineString<f64>| ls.coords().map(|c| vec![c.x, c.y]).collect::<Vec<_>>();
    let polygons = mp.0.iter()
        .map(|polygon| {
            std::iter::once(ring(polygon.exterior()))
                .chain(polygon.interiors().iter().map(ring))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    json!({ "type": "MultiPolygon", "coordinates": polygons })
}

/// A FeatureCollection with one feature per territory of the aggregated layer. Properties are
/// the code, name and attributes of the territory, the window counts and the burn days
/// (null where the territory had no fire).
pub fn aggregate_to_geojson(aggregate: &LandAggregate) -> Value {
    let kind = aggregate.kind();
    let features = aggregate.rows()
        .zip(aggregate.layer().shapes())
        .map(|((territory, counts), shape)| {
            let mut properties = Map::new();
            properties.insert(kind.code_column().into(), json!(territory.code.as_str()));
            properties.insert(kind.name_column().into(), json!(territory.name.as_deref()));
            for (key, value) in &territory.attributes {
                properties.insert(key.clone(), json!(value.as_ref()));
            }
            for window in [TimeWindow::Cumulative, TimeWindow::Last7d, TimeWindow::Last24h] {
                properties.insert(window.count_column().into(), json!(counts.and_then(|c| c.fires(window))));
            }
            properties.insert("burn_days".into(), json!(counts.map(|c| c.burn_days)));

            json!({
                "type": "Feature",
                "geometry": multipolygon_to_geojson(shape),
                "properties": properties,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

/// Write an aggregated layer as a GeoJSON file, replacing it.
pub fn write_aggregate(aggregate: &LandAggregate, path: &Path) -> Result<()> {
    let bytes = serde_json::to_vec(&aggregate_to_geojson(aggregate))
        .context("[io::geojson::write] Failed to serialize GeoJSON")?;
    std::fs::write(path, bytes)
        .with_context(|| format!("[io::geojson::write] Failed to write GeoJSON to {}", path.display()))
}
