//! Модуль предобработки данных

pub mod feature_vector;
pub mod normalization;

pub use feature_vector::{FeatureVector, FEATURE_COLUMNS, FEATURE_SCHEMA_VERSION};
pub use normalization::StandardScaler;
