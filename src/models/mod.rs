//! ML модели

pub mod hotspots;
pub mod regression;
pub mod trend;

pub use hotspots::HotspotDetector;
pub use regression::TrainedRegressor;
pub use trend::TrendAnalyzer;
