mod annotate;
mod grid;
mod layer;
mod layer_kind;
mod layers;
mod territory;

pub use annotate::{annotate_intersections, IntersectionSummary};
pub(crate) use annotate::{grid_summaries, land_summaries};
pub use grid::build_grid;
pub use layer::TerritoryLayer;
pub use layer_kind::LayerKind;
pub use layers::TerritoryLayers;
pub use territory::{Territory, TerritoryCode, TerritoryFeature, TerritoryField};
