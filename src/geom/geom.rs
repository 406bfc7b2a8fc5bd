use geo::{BoundingRect, Contains, Intersects, MultiPolygon, Point, Rect};
use rstar::{RTree, RTreeObject, AABB};
use smallvec::SmallVec;

/// Matches of one query against a layer; overlapping layers rarely yield more than a handful.
pub(crate) type Hits = SmallVec<[usize; 4]>;

/// R-tree entry: the envelope of one shape and the shape's slot in `Geometries::shapes`.
#[derive(Debug, Clone)]
struct ShapeEnvelope {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl ShapeEnvelope {
    fn new(slot: usize, rect: Rect<f64>) -> Self {
        Self { slot, envelope: envelope_of(rect) }
    }
}

impl RTreeObject for ShapeEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope { self.envelope }
}

fn envelope_of(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners(rect.min().into(), rect.max().into())
}

/// Geometries holds the shapes of one territory layer behind an R-tree of their bounding boxes.
/// Shapes may overlap; every query reports all matches in ascending shape order.
#[derive(Debug, Clone)]
pub(crate) struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<ShapeEnvelope>,
}

impl Geometries {
    /// Construct a Geometries object from a vector of MultiPolygons.
    /// Empty shapes are kept (so indices line up with territories) but never indexed.
    pub(crate) fn new(polygons: Vec<MultiPolygon<f64>>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                polygons.iter().enumerate()
                    .filter_map(|(i, polygon)| polygon.bounding_rect().map(|rect| ShapeEnvelope::new(i, rect)))
                    .collect()
            ),
            shapes: polygons,
        }
    }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub(crate) fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    /// Indices of every shape that strictly contains the point (boundary points are not within).
    pub(crate) fn containing(&self, point: &Point<f64>) -> Hits {
        let env = AABB::from_point([point.x(), point.y()]);
        let mut hits = self.rtree
            .locate_in_envelope_intersecting(&env)
            .map(|entry| entry.slot)
            .filter(|&i| self.shapes[i].contains(point))
            .collect::<Hits>();
        hits.sort_unstable();
        hits
    }

    /// Indices of every shape that intersects the given polygon.
    pub(crate) fn intersecting(&self, polygon: &MultiPolygon<f64>) -> Hits {
        let Some(rect) = polygon.bounding_rect() else { return Hits::new() };
        let env = envelope_of(rect);
        let mut hits = self.rtree
            .locate_in_envelope_intersecting(&env)
            .map(|entry| entry.slot)
            .filter(|&i| self.shapes[i].intersects(polygon))
            .collect::<Hits>();
        hits.sort_unstable();
        hits
    }
}
