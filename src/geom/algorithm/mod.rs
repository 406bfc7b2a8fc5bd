mod proj;
mod repair;

pub use proj::Reprojector;
pub(crate) use repair::{clip_to, repair};
