#![doc = "Firescope public API"]
pub mod aggregate;
pub mod archive;
pub mod burn_days;
pub mod clip;
pub mod config;
pub mod dedup;
pub mod detection;
pub mod enrich;
mod errors;
pub mod geom;
pub mod io;
pub mod pipeline;
pub mod territory;

#[doc(inline)]
pub use errors::{FireError, Result};

#[doc(inline)]
pub use config::{DetectionColumns, LayerJoin, PipelineConfig, Retention};

#[doc(inline)]
pub use geom::Crs;

#[doc(inline)]
pub use clip::StudyBoundary;

#[doc(inline)]
pub use pipeline::{build_layers, LayerBuild, Pipeline, RunInputs, RunOutput, WindowRun};
