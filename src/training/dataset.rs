//! Загрузка датасетов с размеченными строками

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2};
use serde::Deserialize;

use crate::error::EngineError;
use crate::registry::PartitionKey;
use crate::types::{BoundingBox, ShopType};

/// Нормализатор плотности при расчете уровня активности
const DENSITY_NORMALIZER: f64 = 10000.0;

/// Строка признаков датасета; отсутствующие поля получают нейтральные значения
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeatureRecord {
    pub total_objects: f64,
    pub avg_area: f64,
    pub subway_stations: f64,
    pub avg_dist_to_subway: f64,
    pub avg_dist_to_primary: f64,
    pub object_density: f64,
    pub new_object_rate: f64,
    pub closure_rate: f64,
    pub trend_slope: f64,
    pub activity_level: Option<f64>,
}

impl FeatureRecord {
    /// Значения в порядке FEATURE_COLUMNS
    pub fn to_values(&self) -> Vec<f64> {
        vec![
            self.total_objects,
            self.avg_area,
            self.subway_stations,
            self.avg_dist_to_subway,
            self.avg_dist_to_primary,
            self.object_density,
            self.new_object_rate,
            self.trend_slope,
        ]
    }

    /// Целевой уровень активности: явный положительный, либо взвешенная
    /// сумма прироста, стабильности и плотности
    pub fn target_activity(&self) -> f64 {
        match self.activity_level {
            Some(level) if level > 0.0 => level,
            _ => {
                let normalized_density = self.object_density / DENSITY_NORMALIZER;
                self.new_object_rate * 0.4
                    + (1.0 - self.closure_rate) * 0.3
                    + normalized_density * 0.3
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct DatasetFile {
    clusters: Vec<DatasetCluster>,
}

#[derive(Debug, Deserialize)]
struct DatasetCluster {
    bbox: String,
    data: Vec<YearSnapshot>,
}

#[derive(Debug, Deserialize)]
struct YearSnapshot {
    year: i32,
    data: Vec<FeatureRecord>,
}

/// Таблица размеченных строк одной партиции
#[derive(Debug, Clone, Default)]
pub struct TrainingTable {
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl TrainingTable {
    pub fn push(&mut self, row: Vec<f64>, target: f64) {
        self.rows.push(row);
        self.targets.push(target);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_arrays(&self) -> (Array2<f64>, Array1<f64>) {
        let n_features = self.rows.first().map_or(0, |row| row.len());
        let mut X = Array2::zeros((self.rows.len(), n_features));
        for (i, row) in self.rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                X[[i, j]] = *value;
            }
        }
        (X, Array1::from_vec(self.targets.clone()))
    }
}

/// Разбор имени файла dataset_{shop}_{YYYYMMDD}_to_{YYYYMMDD}.json
pub fn parse_dataset_filename(file_name: &str) -> Option<(ShopType, i32, i32)> {
    let name = file_name
        .strip_prefix("dataset_")?
        .strip_suffix(".json")?;
    let parts: Vec<&str> = name.split('_').collect();
    if parts.len() != 4 || parts[2] != "to" {
        return None;
    }

    let shop_type = parts[0].parse().ok()?;
    let start_year: i32 = parts[1].get(..4)?.parse().ok()?;
    let end_year: i32 = parts[3].get(..4)?.parse().ok()?;
    Some((shop_type, start_year, end_year))
}

/// Загрузка датасета: ключ партиции + таблица размеченных строк.
/// Рамка партиции — объединение рамок всех кластеров файла.
pub fn load_dataset(path: &Path) -> Result<(PartitionKey, TrainingTable), EngineError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (shop_type, train_start, train_end) = parse_dataset_filename(&file_name)
        .ok_or_else(|| EngineError::Training(format!("invalid dataset filename: {}", file_name)))?;

    let raw = fs::read_to_string(path)?;
    let dataset: DatasetFile = serde_json::from_str(&raw)?;

    let mut table = TrainingTable::default();
    let mut bounds: Option<BoundingBox> = None;

    for cluster in &dataset.clusters {
        let cluster_bounds = match BoundingBox::parse(&cluster.bbox) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("Skipping cluster with invalid bbox {}: {}", cluster.bbox, e);
                continue;
            }
        };
        bounds = Some(match bounds {
            Some(acc) => acc.envelope(&cluster_bounds),
            None => cluster_bounds,
        });

        for snapshot in &cluster.data {
            tracing::debug!(
                "Cluster {}: year {}, {} rows",
                cluster.bbox,
                snapshot.year,
                snapshot.data.len()
            );
            for record in &snapshot.data {
                table.push(record.to_values(), record.target_activity());
            }
        }
    }

    let bounds = bounds.ok_or_else(|| {
        EngineError::Training(format!("dataset {} has no usable clusters", file_name))
    })?;

    Ok((
        PartitionKey {
            shop_type,
            train_start,
            train_end,
            bounds,
        },
        table,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::feature_vector::FEATURE_COLUMNS;
    use crate::types::ShopType;

    #[test]
    fn test_parse_dataset_filename() {
        let (shop_type, start, end) =
            parse_dataset_filename("dataset_supermarket_20200101_to_20231231.json").unwrap();
        assert_eq!(shop_type, ShopType::Supermarket);
        assert_eq!(start, 2020);
        assert_eq!(end, 2023);

        assert!(parse_dataset_filename("dataset_supermarket.json").is_none());
        assert!(parse_dataset_filename("dataset_bakery_20200101_to_20231231.json").is_none());
        assert!(parse_dataset_filename("model_supermarket_20200101_to_20231231.json").is_none());
    }

    #[test]
    fn test_record_values_match_schema_width() {
        let record = FeatureRecord::default();
        assert_eq!(record.to_values().len(), FEATURE_COLUMNS.len());
    }

    #[test]
    fn test_derived_target_uses_weighted_sum() {
        let record = FeatureRecord {
            new_object_rate: 0.5,
            closure_rate: 0.2,
            object_density: 5000.0,
            ..FeatureRecord::default()
        };
        let expected = 0.5 * 0.4 + 0.8 * 0.3 + 0.5 * 0.3;
        assert!((record.target_activity() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_positive_target_wins() {
        let record = FeatureRecord {
            activity_level: Some(0.9),
            new_object_rate: 0.5,
            ..FeatureRecord::default()
        };
        assert_eq!(record.target_activity(), 0.9);

        // Неположительная разметка заменяется производной
        let unset = FeatureRecord {
            activity_level: Some(0.0),
            closure_rate: 1.0,
            ..FeatureRecord::default()
        };
        assert_eq!(unset.target_activity(), 0.0);
    }

    #[test]
    fn test_load_dataset_collects_rows_and_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset_restaurant_20200101_to_20221231.json");

        let payload = serde_json::json!({
            "clusters": [
                {
                    "bbox": "55.70,37.50,55.75,37.60",
                    "data": [
                        { "year": 2020, "data": [
                            { "total_objects": 10.0, "object_density": 100.0 },
                            { "total_objects": 12.0, "new_object_rate": 0.1 }
                        ]},
                        { "year": 2021, "data": [
                            { "total_objects": 14.0, "closure_rate": 0.05 }
                        ]}
                    ]
                },
                {
                    "bbox": "55.75,37.60,55.80,37.70",
                    "data": [
                        { "year": 2020, "data": [ { "total_objects": 7.0 } ] }
                    ]
                }
            ]
        });
        fs::write(&path, payload.to_string()).unwrap();

        let (key, table) = load_dataset(&path).unwrap();
        assert_eq!(key.shop_type, ShopType::Restaurant);
        assert_eq!(key.train_start, 2020);
        assert_eq!(key.train_end, 2022);
        assert_eq!(table.len(), 4);

        // Рамка партиции накрывает оба кластера
        assert_eq!(key.bounds, BoundingBox::new(55.70, 37.50, 55.80, 37.70));

        let (X, y) = table.to_arrays();
        assert_eq!(X.nrows(), 4);
        assert_eq!(X.ncols(), FEATURE_COLUMNS.len());
        assert_eq!(y.len(), 4);
        assert_eq!(X[[0, 0]], 10.0);
    }

    #[test]
    fn test_dataset_without_clusters_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset_clothing_20200101_to_20221231.json");
        fs::write(&path, r#"{"clusters": []}"#).unwrap();
        assert!(load_dataset(&path).is_err());
    }
}
