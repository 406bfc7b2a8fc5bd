mod algorithm;
mod crs;
mod geom;

pub(crate) use algorithm::{clip_to, repair};
pub use algorithm::Reprojector;
pub use crs::Crs;
pub(crate) use geom::{Geometries, Hits};

/// Render a point as WKT text.
pub(crate) fn point_wkt(point: &geo::Point<f64>) -> String {
    format!("POINT ({} {})", point.x(), point.y())
}
