//! Реестр обученных моделей

pub mod store;

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::regression::TrainedRegressor;
use crate::preprocessing::feature_vector::FEATURE_SCHEMA_VERSION;
use crate::preprocessing::normalization::StandardScaler;
use crate::types::{BoundingBox, ModelInfo, ModelMetrics, ShopType};

use store::ArtifactStore;

/// Ключ партиции: категория, период обучения, географическая рамка
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionKey {
    pub shop_type: ShopType,
    pub train_start: i32,
    pub train_end: i32,
    pub bounds: BoundingBox,
}

impl PartitionKey {
    /// Кодированное имя артефакта:
    /// model_{shop}_{start}-{end}_{min_lat}_{min_lon}_{max_lat}_{max_lon}
    pub fn encoded_name(&self) -> String {
        store::encode_name(self)
    }

    pub fn train_period(&self) -> String {
        format!("{}-{}", self.train_start, self.train_end)
    }
}

/// Обученный артефакт: регрессор + его скейлер + метрики.
/// Создается только пайплайном обучения и после фиксации не изменяется —
/// переобучение заменяет артефакт целиком.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: TrainedRegressor,
    pub scaler: StandardScaler,
    pub metrics: ModelMetrics,
    pub schema_version: u32,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    /// Проверка соответствия схемы признаков; расхождение фатально
    pub fn check_schema(&self, vector_len: usize) -> Result<(), EngineError> {
        if self.schema_version != FEATURE_SCHEMA_VERSION {
            return Err(EngineError::SchemaMismatch(format!(
                "artifact schema version {} does not match current version {}",
                self.schema_version, FEATURE_SCHEMA_VERSION
            )));
        }

        let expected = self.scaler.n_features();
        if expected != vector_len || self.model.n_features() != vector_len {
            return Err(EngineError::SchemaMismatch(format!(
                "model expects {} features, builder produced {}",
                expected, vector_len
            )));
        }

        Ok(())
    }
}

struct RegistryEntry {
    key: PartitionKey,
    artifact: Arc<ModelArtifact>,
}

/// Явный индекс PartitionKey -> артефакт.
/// Чтения конкурентны; фиксация заменяет запись целиком, поэтому читатель
/// всегда видит либо полностью старую, либо полностью новую пару
/// модель/скейлер. Порядок записей — порядок фиксации.
pub struct ModelRegistry {
    entries: RwLock<Vec<RegistryEntry>>,
    store: ArtifactStore,
}

impl ModelRegistry {
    /// Загрузка сохраненных артефактов при старте процесса
    pub fn load(store: ArtifactStore) -> Self {
        let mut entries = Vec::new();
        match store.scan() {
            Ok(loaded) => {
                for (key, artifact) in loaded {
                    tracing::info!("Loaded model {}", key.encoded_name());
                    entries.push(RegistryEntry {
                        key,
                        artifact: Arc::new(artifact),
                    });
                }
            }
            Err(e) => tracing::warn!("Failed to scan artifact store: {}", e),
        }

        Self {
            entries: RwLock::new(entries),
            store,
        }
    }

    /// Разрешение запроса: первый артефакт категории, рамка которого полностью
    /// содержит запрошенную; иначе самый свежий артефакт категории; иначе ошибка.
    pub fn resolve(
        &self,
        shop_type: ShopType,
        bounds: &BoundingBox,
    ) -> Result<(PartitionKey, Arc<ModelArtifact>), EngineError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());

        let mut fallback: Option<&RegistryEntry> = None;
        for entry in entries.iter().filter(|e| e.key.shop_type == shop_type) {
            if entry.key.bounds.contains(bounds) {
                return Ok((entry.key.clone(), Arc::clone(&entry.artifact)));
            }
            // Последняя зафиксированная запись категории — самая свежая
            fallback = Some(entry);
        }

        match fallback {
            Some(entry) => {
                tracing::warn!(
                    "No exact area match found for {}, using the latest model",
                    shop_type
                );
                Ok((entry.key.clone(), Arc::clone(&entry.artifact)))
            }
            None => Err(EngineError::ModelUnavailable(shop_type)),
        }
    }

    /// Фиксация артефакта: запись в хранилище, затем атомарная замена записи
    pub fn commit(&self, key: PartitionKey, artifact: ModelArtifact) -> Result<(), EngineError> {
        self.store.save(&key, &artifact)?;

        let artifact = Arc::new(artifact);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|entry| entry.key != key);
        entries.push(RegistryEntry { key, artifact });
        Ok(())
    }

    pub fn has_models_for(&self, shop_type: ShopType) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.iter().any(|entry| entry.key.shop_type == shop_type)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Список артефактов для внешнего потребителя
    pub fn list(&self) -> Vec<ModelInfo> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .map(|entry| ModelInfo {
                name: entry.key.encoded_name(),
                shop_type: entry.key.shop_type,
                train_period: entry.key.train_period(),
                bbox: entry.key.bounds.to_string(),
                metrics: entry.artifact.metrics,
            })
            .collect()
    }
}
