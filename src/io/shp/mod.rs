//! Shapefile reading operations.

mod polygon;
mod read;

pub use read::*;
