pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod grid;
pub mod model;
pub mod prelude;

pub use config::PipelineConfig;
pub use error::{RidecastError, RidecastResult};
pub use features::pipeline::FeaturePipeline;
