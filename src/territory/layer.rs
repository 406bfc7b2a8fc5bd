use std::{collections::BTreeSet, sync::Arc};

use ahash::AHashMap;
use geo::{MultiPolygon, Point};
use polars::{frame::DataFrame, prelude::Column};
use tracing::{debug, warn};

use crate::{
    errors::{FireError, Result},
    geom::{Crs, Geometries},
    territory::{LayerKind, Territory, TerritoryCode, TerritoryFeature},
};

/// A complete collection of territories of one kind, with an R-tree over their shapes.
/// Layers are static reference data: operations that annotate them return new layers.
#[derive(Debug, Clone)]
pub struct TerritoryLayer {
    kind: LayerKind,
    crs: Crs,
    territories: Vec<Territory>,
    index: AHashMap<TerritoryCode, usize>, // Map between codes and contiguous indices
    geoms: Geometries,
}

impl TerritoryLayer {
    /// Index loaded features. Missing or blank codes are synthesized; repeated codes keep
    /// the first feature and drop the rest with a warning.
    pub fn from_features(kind: LayerKind, crs: Crs, features: Vec<TerritoryFeature>) -> Self {
        let mut territories = Vec::with_capacity(features.len());
        let mut shapes = Vec::with_capacity(features.len());
        let mut index = AHashMap::with_capacity(features.len());

        for feature in features {
            let code = match feature.code.as_deref().map(str::trim) {
                Some(code) if !code.is_empty() => TerritoryCode::new(code),
                _ => {
                    let code = TerritoryCode::synthesize();
                    debug!(layer = %kind, code = %code, "synthesized territory code");
                    code
                }
            };
            if index.contains_key(&code) {
                warn!(layer = %kind, code = %code, "dropping territory with repeated code");
                continue;
            }

            index.insert(code.clone(), territories.len());
            territories.push(Territory {
                code,
                name: feature.name.map(Arc::from),
                attributes: feature.attributes.into_iter()
                    .map(|(key, value)| (key, Arc::from(value)))
                    .collect(),
            });
            shapes.push(feature.geometry);
        }

        Self { kind, crs, territories, index, geoms: Geometries::new(shapes) }
    }

    /// Rebuild a layer from already-indexed parts (same order for territories and shapes).
    pub(crate) fn from_parts(kind: LayerKind, crs: Crs, territories: Vec<Territory>, shapes: Vec<MultiPolygon<f64>>) -> Self {
        debug_assert_eq!(territories.len(), shapes.len(), "territory/shape count mismatch");
        let index = territories.iter().enumerate()
            .map(|(i, territory)| (territory.code.clone(), i))
            .collect();
        Self { kind, crs, territories, index, geoms: Geometries::new(shapes) }
    }

    #[inline] pub fn kind(&self) -> LayerKind { self.kind }

    #[inline] pub fn crs(&self) -> Crs { self.crs }

    #[inline] pub fn len(&self) -> usize { self.territories.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.territories.is_empty() }

    #[inline] pub fn territories(&self) -> &[Territory] { &self.territories }

    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { self.geoms.shapes() }

    /// Look up a territory by code.
    pub fn get(&self, code: &TerritoryCode) -> Option<&Territory> {
        self.index.get(code).map(|&i| &self.territories[i])
    }

    /// Indices of the territories strictly containing the point.
    pub(crate) fn containing(&self, point: &Point<f64>) -> crate::geom::Hits {
        self.geoms.containing(point)
    }

    /// Indices of the territories intersecting the polygon.
    pub(crate) fn intersecting(&self, polygon: &MultiPolygon<f64>) -> crate::geom::Hits {
        self.geoms.intersecting(polygon)
    }

    /// Fail unless the layer is expressed in `expected`.
    pub fn ensure_crs(&self, expected: Crs) -> Result<()> {
        if self.crs != expected {
            return Err(FireError::CoordinateMismatch {
                layer: self.kind.to_string(),
                expected: expected.epsg(),
                found: self.crs.epsg(),
            });
        }
        Ok(())
    }

    /// Sorted union of the attribute keys present on any territory.
    pub fn attribute_keys(&self) -> Vec<&str> {
        self.territories.iter()
            .flat_map(|territory| territory.attributes.keys().map(String::as_str))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The static territory table: code, name, then every attribute column (absent values are null).
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns = vec![
            Column::new(
                self.kind.code_column().into(),
                self.territories.iter().map(|t| t.code.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                self.kind.name_column().into(),
                self.territories.iter().map(|t| t.name.as_deref()).collect::<Vec<_>>(),
            ),
        ];
        for key in self.attribute_keys() {
            columns.push(Column::new(
                key.into(),
                self.territories.iter()
                    .map(|t| t.attributes.get(key).map(|v| v.as_ref()))
                    .collect::<Vec<_>>(),
            ));
        }
        Ok(DataFrame::new(columns)?)
    }
}
