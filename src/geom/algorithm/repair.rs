use geo::{Area, BooleanOps, CoordsIter, MultiPolygon};

/// Rebuild a possibly self-intersecting polygon into a valid one.
/// The overlay engine resolves crossings and orientation the way a zero-width buffer does.
pub(crate) fn repair(shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, String> {
    if shape.0.is_empty() {
        return Err("empty geometry".into());
    }
    if shape.coords_iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err("non-finite coordinate".into());
    }

    let repaired = shape.union(&MultiPolygon::new(vec![]));
    if repaired.0.is_empty() || repaired.unsigned_area() == 0.0 {
        return Err("polygon collapses to zero area".into());
    }
    Ok(repaired)
}

/// Repair a polygon and trim it to the boundary. Returns `Ok(None)` when nothing is left inside.
pub(crate) fn clip_to(shape: &MultiPolygon<f64>, boundary: &MultiPolygon<f64>) -> Result<Option<MultiPolygon<f64>>, String> {
    let clipped = repair(shape)?.intersection(boundary);
    Ok((!clipped.0.is_empty() && clipped.unsigned_area() > 0.0).then_some(clipped))
}
