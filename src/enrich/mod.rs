mod enricher;
mod table;

pub use enricher::SpatialEnricher;
pub use table::{EnrichedColumn, EnrichedRow, EnrichedSchema, EnrichedTable};
