//! Хранилище артефактов на диске

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::regression::TrainedRegressor;
use crate::preprocessing::normalization::StandardScaler;
use crate::types::{BoundingBox, ModelMetrics};

use super::{ModelArtifact, PartitionKey};

/// Сводный индекс метрик по именам артефактов
const METRICS_INDEX: &str = "training_metrics.json";

/// Документ модели; скейлер лежит рядом в отдельном файле
#[derive(Debug, Serialize, Deserialize)]
struct StoredModel {
    schema_version: u32,
    trained_at: DateTime<Utc>,
    model: TrainedRegressor,
}

/// Директория JSON-документов: модель, скейлер и метрики под общим
/// кодированным именем. Разбор имен отделен от логики поиска в реестре.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Сканирование хранилища; артефакты с нечитаемыми файлами пропускаются
    pub fn scan(&self) -> Result<Vec<(PartitionKey, ModelArtifact)>, EngineError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(name) = file_name.strip_suffix(".json") {
                if name.starts_with("model_") {
                    names.push(name.to_string());
                }
            }
        }
        // Детерминированный порядок загрузки
        names.sort();

        let mut artifacts = Vec::new();
        for name in names {
            match self.load(&name) {
                Ok(pair) => artifacts.push(pair),
                Err(e) => tracing::warn!("Skipping artifact {}: {}", name, e),
            }
        }
        Ok(artifacts)
    }

    fn load(&self, name: &str) -> Result<(PartitionKey, ModelArtifact), EngineError> {
        let key =
            decode_name(name).ok_or_else(|| EngineError::InvalidArtifactName(name.to_string()))?;

        let model_raw = fs::read_to_string(self.dir.join(format!("{}.json", name)))?;
        let stored: StoredModel = serde_json::from_str(&model_raw)?;

        let scaler_raw = fs::read_to_string(self.dir.join(format!("scaler_{}.json", name)))?;
        let scaler: StandardScaler = serde_json::from_str(&scaler_raw)?;

        let metrics = self.read_metrics(name).unwrap_or_default();

        Ok((
            key,
            ModelArtifact {
                model: stored.model,
                scaler,
                metrics,
                schema_version: stored.schema_version,
                trained_at: stored.trained_at,
            },
        ))
    }

    /// Запись модели, скейлера и метрик под кодированным именем ключа
    pub fn save(&self, key: &PartitionKey, artifact: &ModelArtifact) -> Result<(), EngineError> {
        let name = encode_name(key);

        let stored = StoredModel {
            schema_version: artifact.schema_version,
            trained_at: artifact.trained_at,
            model: artifact.model.clone(),
        };
        fs::write(
            self.dir.join(format!("{}.json", name)),
            serde_json::to_string_pretty(&stored)?,
        )?;
        fs::write(
            self.dir.join(format!("scaler_{}.json", name)),
            serde_json::to_string_pretty(&artifact.scaler)?,
        )?;

        self.update_metrics_index(&name, artifact.metrics)?;
        Ok(())
    }

    fn read_metrics(&self, name: &str) -> Option<ModelMetrics> {
        let raw = fs::read_to_string(self.dir.join(METRICS_INDEX)).ok()?;
        let index: BTreeMap<String, ModelMetrics> = serde_json::from_str(&raw).ok()?;
        index.get(name).copied()
    }

    fn update_metrics_index(&self, name: &str, metrics: ModelMetrics) -> Result<(), EngineError> {
        let path = self.dir.join(METRICS_INDEX);

        let mut index: BTreeMap<String, ModelMetrics> = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Metrics index is unreadable, rebuilding: {}", e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        index.insert(name.to_string(), metrics);
        fs::write(&path, serde_json::to_string_pretty(&index)?)?;
        Ok(())
    }
}

pub(crate) fn encode_name(key: &PartitionKey) -> String {
    format!(
        "model_{}_{}-{}_{}_{}_{}_{}",
        key.shop_type,
        key.train_start,
        key.train_end,
        key.bounds.min_lat,
        key.bounds.min_lon,
        key.bounds.max_lat,
        key.bounds.max_lon
    )
}

pub(crate) fn decode_name(name: &str) -> Option<PartitionKey> {
    let rest = name.strip_prefix("model_")?;
    let parts: Vec<&str> = rest.split('_').collect();
    if parts.len() != 6 {
        return None;
    }

    let shop_type = parts[0].parse().ok()?;
    let (start, end) = parts[1].split_once('-')?;
    let train_start: i32 = start.parse().ok()?;
    let train_end: i32 = end.parse().ok()?;

    let min_lat: f64 = parts[2].parse().ok()?;
    let min_lon: f64 = parts[3].parse().ok()?;
    let max_lat: f64 = parts[4].parse().ok()?;
    let max_lon: f64 = parts[5].parse().ok()?;

    Some(PartitionKey {
        shop_type,
        train_start,
        train_end,
        bounds: BoundingBox::new(min_lat, min_lon, max_lat, max_lon),
    })
}
