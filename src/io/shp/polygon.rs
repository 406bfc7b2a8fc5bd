use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile as shp;

/// Convert a Shapefile polygon (outer rings clockwise, each followed by its holes)
/// into a MultiPolygon.
pub(crate) fn shp_to_geo(p: &shp::Polygon) -> MultiPolygon<f64> {
    /// Close a ring in place.
    fn ensure_closed(coords: &mut Vec<Coord<f64>>) {
        if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
            if first != last {
                coords.push(first);
            }
        }
    }

    /// Shoelace area; negative for clockwise rings.
    fn signed_area(pts: &[Coord<f64>]) -> f64 {
        pts.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum::<f64>() / 2.0
    }

    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in p.rings() {
        let mut coords = ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect::<Vec<_>>();
        ensure_closed(&mut coords);
        if coords.len() < 4 {
            continue;
        }
        let is_exterior = signed_area(&coords) < 0.0;
        let ring = LineString(coords);
        if is_exterior {
            if let Some(outer) = exterior.take() {
                polygons.push(Polygon::new(outer, std::mem::take(&mut holes)));
            }
            exterior = Some(ring);
        } else {
            holes.push(ring);
        }
    }
    if let Some(outer) = exterior {
        polygons.push(Polygon::new(outer, holes));
    }

    MultiPolygon(polygons)
}
