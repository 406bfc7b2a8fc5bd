//! Parquet format writing operations.

mod write;

pub use write::*;
