mod merge;
mod rank;
mod window;

pub use merge::{aggregate_layer, aggregate_layers, count_by_territory, AggregationReport, LandAggregate, TerritoryCounts};
pub use rank::{rank_territories, top_territory};
pub use window::{TimeWindow, WindowSet, WindowTables};
