//! Построение вектора признаков фиксированной схемы

use ndarray::Array1;

use crate::types::FeatureSet;

/// Версия схемы признаков; артефакт с другой версией несовместим
pub const FEATURE_SCHEMA_VERSION: u32 = 2;

/// Колонки признаков в фиксированном порядке
pub const FEATURE_COLUMNS: [&str; 8] = [
    "total_objects",
    "avg_area",
    "subway_stations",
    "avg_dist_to_subway",
    "avg_dist_to_primary",
    "object_density",
    "new_object_rate",
    "trend_slope",
];

/// Упорядоченный числовой вектор признаков
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Array1<f64>);

impl FeatureVector {
    /// Собирает вектор из вложенного набора признаков.
    /// Отсутствующие поля уже заменены нейтральными значениями (0 / 0.0)
    /// при десериализации, поэтому частичные данные не отклоняются.
    pub fn from_feature_set(features: &FeatureSet) -> Self {
        let spatial = &features.spatial;
        let temporal = &features.temporal;

        Self(Array1::from_vec(vec![
            spatial.total_objects as f64,
            spatial.avg_area,
            spatial.subway_stations as f64,
            spatial.avg_dist_to_subway,
            spatial.avg_dist_to_primary,
            temporal.object_density,
            temporal.new_object_rate,
            temporal.trend_slope,
        ]))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_array(&self) -> &Array1<f64> {
        &self.0
    }
}
