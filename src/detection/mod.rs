mod detection;
mod project;
mod table;

pub use detection::{DetectionId, FireDetection, NaturalKey};
pub use project::{assign_identifiers, GeometryProjector};
pub use table::DetectionTable;
pub(crate) use table::detection_columns;
