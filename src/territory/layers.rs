use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    clip::StudyBoundary,
    errors::Result,
    geom::Crs,
    territory::{LayerKind, TerritoryLayer},
};

/// The static reference data of one run: the study boundary and one layer per kind,
/// all in the boundary's CRS. Passed explicitly to every stage that reads territories.
#[derive(Debug, Clone)]
pub struct TerritoryLayers {
    boundary: StudyBoundary,
    layers: BTreeMap<LayerKind, TerritoryLayer>,
}

impl TerritoryLayers {
    pub fn new(boundary: StudyBoundary) -> Self {
        Self { boundary, layers: BTreeMap::new() }
    }

    /// Register a layer, replacing any previous layer of the same kind.
    /// A layer in another CRS than the boundary is rejected.
    pub fn insert(&mut self, layer: TerritoryLayer) -> Result<Option<TerritoryLayer>> {
        layer.ensure_crs(self.boundary.crs())?;
        debug!(layer = %layer.kind(), territories = layer.len(), "registered territory layer");
        Ok(self.layers.insert(layer.kind(), layer))
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_layer(mut self, layer: TerritoryLayer) -> Result<Self> {
        self.insert(layer)?;
        Ok(self)
    }

    #[inline] pub fn boundary(&self) -> &StudyBoundary { &self.boundary }

    #[inline] pub fn crs(&self) -> Crs { self.boundary.crs() }

    #[inline] pub fn get(&self, kind: LayerKind) -> Option<&TerritoryLayer> { self.layers.get(&kind) }

    #[inline] pub fn len(&self) -> usize { self.layers.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.layers.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &TerritoryLayer> + '_ {
        self.layers.values()
    }
}
