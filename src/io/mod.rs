//! Caller-side adapters between files and the core tables, organized by format.
//!
//! - `csv` - raw and enriched detection tables, aggregated territory tables, audit logs
//! - `shp` - territory layers and the study boundary from Shapefiles
//! - `geojson` - territory layers in, aggregated territory layers out
//! - `parquet` - tabular output (requires `parquet` feature)
//!
//! The core stages never touch files; everything here runs before data enters or after it
//! leaves them.

pub mod csv;
pub mod geojson;
pub mod shp;

#[cfg(feature = "parquet")]
pub mod parquet;

use std::{collections::BTreeMap, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::territory::LayerKind;

/// Which source fields of a territory file carry the code, the name and the attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFields {
    pub code: Option<String>,
    pub name: Option<String>,
    /// Attribute key in the layer -> field name in the file.
    pub attributes: BTreeMap<String, String>,
}

/// One territory layer file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSource {
    pub kind: LayerKind,
    pub path: PathBuf,
    #[serde(flatten)]
    pub fields: FeatureFields,
}

/// The static inputs of a run: boundary and territory layer files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceManifest {
    pub boundary: PathBuf,
    #[serde(default)]
    pub layers: Vec<LayerSource>,
}

impl SourceManifest {
    /// Read a manifest; relative paths are resolved against the manifest's directory.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("[io] Failed to read source manifest {}", path.display()))?;
        let mut manifest: SourceManifest = serde_json::from_str(&text)
            .with_context(|| format!("[io] Failed to parse source manifest {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.boundary = base.join(&manifest.boundary);
        for layer in &mut manifest.layers {
            layer.path = base.join(&layer.path);
        }
        Ok(manifest)
    }
}

/// Format of a territory file, from its extension.
pub(crate) fn is_geojson(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("json" | "geojson")
    )
}

/// Load a layer file in whichever supported format its extension names.
pub fn read_layer_source(source: &LayerSource) -> Result<Vec<crate::territory::TerritoryFeature>> {
    if is_geojson(&source.path) {
        geojson::read_territories(&source.path, &source.fields)
    } else {
        shp::read_territories(&source.path, &source.fields)
    }
}

/// Load the study boundary polygon in whichever supported format its extension names.
pub fn read_boundary(path: &Path) -> Result<geo::MultiPolygon<f64>> {
    if is_geojson(path) {
        geojson::read_boundary(path)
    } else {
        shp::read_boundary(path)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{is_geojson, SourceManifest};
    use crate::territory::LayerKind;

    #[test]
    fn manifest_paths_are_relative_to_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.json");
        std::fs::write(&path, r#"{
            "boundary": "legal_amazon.shp",
            "layers": [
                { "kind": "city", "path": "cities.shp", "code": "CD_MUN", "name": "NM_MUN", "attributes": { "state": "SIGLA_UF" } }
            ]
        }"#).unwrap();

        let manifest = SourceManifest::from_json_file(&path).unwrap();
        assert_eq!(manifest.boundary, dir.path().join("legal_amazon.shp"));
        assert_eq!(manifest.layers[0].kind, LayerKind::City);
        assert_eq!(manifest.layers[0].fields.code.as_deref(), Some("CD_MUN"));
        assert_eq!(manifest.layers[0].fields.attributes.get("state").map(String::as_str), Some("SIGLA_UF"));
        assert!(!is_geojson(&manifest.layers[0].path));
        assert!(is_geojson(Path::new("biomes.GeoJSON")));
    }
}
