use geo::Point;
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::{errors::{FireError, Result}, geom::Crs};

/// Converts lon/lat degrees from one geographic CRS into another.
/// Identical source and target systems short-circuit to a plain point construction.
pub struct Reprojector {
    source: Crs,
    target: Crs,
    projs: Option<(Proj4, Proj4)>,
}

impl Reprojector {
    /// Build the transformation, failing fast if either system is undefined.
    pub fn new(source: Crs, target: Crs) -> Result<Self> {
        let from_str = source.proj4()?;
        let to_str = target.proj4()?;

        let projs = if source == target { None } else {
            let from = Proj4::from_proj_string(from_str)
                .map_err(|e| FireError::Proj(format!("failed to build source PROJ.4 {from_str}: {e}")))?;
            let to = Proj4::from_proj_string(to_str)
                .map_err(|e| FireError::Proj(format!("failed to build target PROJ.4 {to_str}: {e}")))?;
            Some((from, to))
        };

        Ok(Self { source, target, projs })
    }

    #[inline] pub fn source(&self) -> Crs { self.source }

    #[inline] pub fn target(&self) -> Crs { self.target }

    /// Project one lon/lat position (degrees) into the target system (degrees).
    pub fn project(&self, lon: f64, lat: f64) -> Result<Point<f64>> {
        let Some((from, to)) = &self.projs else { return Ok(Point::new(lon, lat)) };

        // Degrees in, radians through the datum shift, degrees out.
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        transform(from, to, &mut point)
            .map_err(|e| FireError::Proj(format!("transform of ({lon}, {lat}) failed: {e}")))?;
        Ok(Point::new(point.0.to_degrees(), point.1.to_degrees()))
    }
}
