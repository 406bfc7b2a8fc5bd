use thiserror::Error;

pub type Result<T> = std::result::Result<T, FireError>;

/// Failure classes of the enrichment and aggregation stages.
///
/// Record-scoped variants (`InputValidation`, `Geometry`) are logged and the offending
/// record is dropped; `Aggregation` is isolated to one layer; the remaining variants are
/// configuration defects and abort the run.
#[derive(Error, Debug)]
pub enum FireError {
    #[error("invalid input record {record}: {reason}")]
    InputValidation { record: String, reason: String },

    #[error("coordinate reference mismatch for layer {layer}: expected EPSG:{expected}, found EPSG:{found}")]
    CoordinateMismatch { layer: String, expected: u32, found: u32 },

    #[error("undefined coordinate reference system EPSG:{0}")]
    UndefinedCrs(u32),

    #[error("missing reference boundary")]
    MissingBoundary,

    #[error("invalid geometry for territory {territory} in layer {layer}: {reason}")]
    Geometry { layer: String, territory: String, reason: String },

    #[error("aggregation failed for layer {layer}: {reason}")]
    Aggregation { layer: String, reason: String },

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("projection error: {0}")]
    Proj(String),

    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FireError {
    /// Whether this error must abandon the whole run rather than a single record or layer.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            FireError::InputValidation { .. } | FireError::Geometry { .. } | FireError::Aggregation { .. }
        )
    }
}
