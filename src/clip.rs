//! Restricting detections and territory layers to the study region.

use geo::{BoundingRect, Contains, Intersects, MultiPolygon, Rect};
use tracing::{debug, info, warn};

use crate::{
    detection::DetectionTable,
    errors::{FireError, Result},
    geom::{clip_to, repair, Crs},
    territory::{LayerKind, TerritoryFeature, TerritoryLayer},
};

/// The overall study region every detection and territory is restricted to.
#[derive(Debug, Clone)]
pub struct StudyBoundary {
    crs: Crs,
    shape: MultiPolygon<f64>,
    bounds: Rect<f64>,
}

impl StudyBoundary {
    /// Repair and wrap the region polygon. An empty or unrepairable region is a configuration error.
    pub fn new(crs: Crs, shape: MultiPolygon<f64>) -> Result<Self> {
        if shape.0.is_empty() {
            return Err(FireError::MissingBoundary);
        }
        let shape = repair(&shape).map_err(|reason| FireError::Geometry {
            layer: "boundary".into(),
            territory: "boundary".into(),
            reason,
        })?;
        let bounds = shape.bounding_rect().ok_or(FireError::MissingBoundary)?;
        Ok(Self { crs, shape, bounds })
    }

    #[inline] pub fn crs(&self) -> Crs { self.crs }

    #[inline] pub fn shape(&self) -> &MultiPolygon<f64> { &self.shape }

    #[inline] pub fn bounds(&self) -> Rect<f64> { self.bounds }

    fn ensure_crs(&self, layer: &str, found: Crs) -> Result<()> {
        if self.crs != found {
            return Err(FireError::CoordinateMismatch { layer: layer.into(), expected: self.crs.epsg(), found: found.epsg() });
        }
        Ok(())
    }
}

/// Keep the detections strictly within the boundary. Never mutates the input table.
pub fn clip_points(table: &DetectionTable, boundary: &StudyBoundary) -> Result<DetectionTable> {
    boundary.ensure_crs("detections", table.crs())?;

    let clipped = table.filter(|detection| {
        boundary.bounds.contains(&detection.position) && boundary.shape.contains(&detection.position)
    });
    info!(input = table.len(), kept = clipped.len(), "clipped detections to study boundary");
    Ok(clipped)
}

/// A layer trimmed to the boundary, with the territories that had to be dropped.
#[derive(Debug)]
pub struct PreparedLayer {
    pub layer: TerritoryLayer,
    pub rejected: Vec<FireError>,
}

/// Keep the territories intersecting the boundary and trim their geometry to it.
/// Each shape is repaired first; a shape that cannot be repaired is dropped (GeometryError) and
/// the rest of the layer carries on.
pub fn prepare_layer(kind: LayerKind, crs: Crs, features: Vec<TerritoryFeature>, boundary: &StudyBoundary) -> Result<PreparedLayer> {
    boundary.ensure_crs(kind.to_str(), crs)?;

    let total = features.len();
    let mut kept = Vec::with_capacity(total);
    let mut rejected = Vec::new();

    for (i, mut feature) in features.into_iter().enumerate() {
        let label = feature.code.clone().unwrap_or_else(|| format!("#{i}"));
        let repaired = match repair(&feature.geometry) {
            Ok(shape) => shape,
            Err(reason) => {
                let err = FireError::Geometry { layer: kind.to_string(), territory: label, reason };
                warn!(error = %err, "dropping territory");
                rejected.push(err);
                continue;
            }
        };
        if !repaired.intersects(boundary.shape()) {
            debug!(layer = %kind, territory = %label, "territory outside study boundary");
            continue;
        }
        match clip_to(&repaired, boundary.shape()) {
            Ok(Some(shape)) => {
                feature.geometry = shape;
                kept.push(feature);
            }
            Ok(None) => debug!(layer = %kind, territory = %label, "territory only touches study boundary"),
            Err(reason) => {
                let err = FireError::Geometry { layer: kind.to_string(), territory: label, reason };
                warn!(error = %err, "dropping territory");
                rejected.push(err);
            }
        }
    }

    info!(layer = %kind, input = total, kept = kept.len(), rejected = rejected.len(), "prepared territory layer");
    Ok(PreparedLayer { layer: TerritoryLayer::from_features(kind, crs, kept), rejected })
}
