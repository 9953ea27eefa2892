//! OSM Activity ML - Rust библиотека

pub mod engine;
pub mod error;
pub mod models;
pub mod preprocessing;
pub mod registry;
pub mod training;
pub mod types;

pub use engine::PredictionEngine;
pub use error::EngineError;
pub use models::{HotspotDetector, TrainedRegressor, TrendAnalyzer};
pub use preprocessing::{FeatureVector, StandardScaler};
pub use registry::{ModelArtifact, ModelRegistry, PartitionKey};
pub use training::TrainingPipeline;
pub use types::*;
