use geo::{Intersects, MultiPolygon, Rect};
use tracing::info;

use crate::{
    clip::StudyBoundary,
    errors::{FireError, Result},
    territory::{LayerKind, TerritoryFeature, TerritoryLayer},
};

/// Cover the boundary's bounding box with square tiles of `cell_size` degrees and keep
/// the tiles intersecting the boundary. Tiles stay whole squares; codes are sequential
/// from "1", row by row from the south-west corner.
pub fn build_grid(boundary: &StudyBoundary, cell_size: f64) -> Result<TerritoryLayer> {
    if !(cell_size.is_finite() && cell_size > 0.0) {
        return Err(FireError::Config(format!("grid cell size must be positive, got {cell_size}")));
    }

    let bounds = boundary.bounds();
    let cols = (bounds.width() / cell_size).ceil().max(1.0) as usize;
    let rows = (bounds.height() / cell_size).ceil().max(1.0) as usize;

    let mut features = Vec::new();
    for row in 0..rows {
        let y0 = bounds.min().y + row as f64 * cell_size;
        for col in 0..cols {
            let x0 = bounds.min().x + col as f64 * cell_size;
            let tile = Rect::new((x0, y0), (x0 + cell_size, y0 + cell_size)).to_polygon();
            if !tile.intersects(boundary.shape()) {
                continue;
            }
            let code = (features.len() + 1).to_string();
            features.push(TerritoryFeature::new(Some(&code), None, MultiPolygon::new(vec![tile])));
        }
    }

    info!(tiles = features.len(), candidates = rows * cols, cell_size, "built grid");
    Ok(TerritoryLayer::from_features(LayerKind::Grid, boundary.crs(), features))
}
