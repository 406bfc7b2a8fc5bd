use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{FireError, Result};

/// A geographic coordinate reference system, identified by its EPSG code.
/// Only systems with a known PROJ.4 definition can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Crs(u32);

impl Crs {
    /// WGS 84 lon/lat, the frame satellite detections are published in.
    pub const WGS84: Crs = Crs(4326);
    /// SIRGAS 2000 lon/lat, the frame of the Brazilian territory layers.
    pub const SIRGAS2000: Crs = Crs(4674);
    /// SAD69 lon/lat, the frame of older Brazilian territory datasets.
    pub const SAD69: Crs = Crs(4618);

    /// Look up a CRS by EPSG code, failing if no definition is known for it.
    pub fn from_epsg(code: u32) -> Result<Self> {
        let crs = Crs(code);
        crs.proj4()?;
        Ok(crs)
    }

    #[inline] pub fn epsg(&self) -> u32 { self.0 }

    /// PROJ.4 definition of the system (coordinates in degrees are converted to radians by the caller).
    pub(crate) fn proj4(&self) -> Result<&'static str> {
        match self.0 {
            4326 => Ok("+proj=longlat +datum=WGS84 +no_defs +type=crs"),
            4674 => Ok("+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs +type=crs"),
            4618 => Ok("+proj=longlat +ellps=aust_SA +towgs84=-66.87,4.37,-38.52,0,0,0,0 +no_defs +type=crs"),
            code => Err(FireError::UndefinedCrs(code)),
        }
    }
}

impl Default for Crs {
    fn default() -> Self { Crs::SIRGAS2000 }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl TryFrom<u32> for Crs {
    type Error = FireError;

    fn try_from(code: u32) -> Result<Self> { Crs::from_epsg(code) }
}

impl From<Crs> for u32 {
    fn from(crs: Crs) -> u32 { crs.0 }
}
