//! Пайплайн переобучения моделей

#![allow(non_snake_case)]

pub mod dataset;
pub mod search;

use std::path::PathBuf;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::EngineError;
use crate::models::regression::CandidateParams;
use crate::models::regression::TrainedRegressor;
use crate::preprocessing::feature_vector::FEATURE_SCHEMA_VERSION;
use crate::preprocessing::normalization::StandardScaler;
use crate::registry::{ModelArtifact, ModelRegistry, PartitionKey};
use crate::types::{ModelMetrics, ShopType};

use dataset::TrainingTable;
use search::{candidate_grid, cross_validate, mean_squared_error, r2_score, select_rows, select_targets};

/// Фиксированное зерно для воспроизводимости обучения
pub const TRAINING_SEED: u64 = 42;
/// Доля отложенной выборки
const TEST_RATIO: f64 = 0.2;
/// Минимальное количество строк для обучения партиции
const MIN_TRAINING_ROWS: usize = 10;

/// Пайплайн: поиск по кандидатам, выбор победителя на отложенной выборке,
/// фиксация артефакта в реестре. Пишет только в реестр, живые запросы не читает.
pub struct TrainingPipeline {
    datasets_dir: PathBuf,
    seed: u64,
}

impl TrainingPipeline {
    pub fn new(datasets_dir: impl Into<PathBuf>) -> Self {
        Self {
            datasets_dir: datasets_dir.into(),
            seed: TRAINING_SEED,
        }
    }

    /// Полный проход по датасетам; каждая партиция обучается независимо,
    /// сбой одной не прерывает остальные. Возвращает число зафиксированных моделей.
    pub fn run(&self, registry: &ModelRegistry) -> usize {
        self.run_filtered(registry, None)
    }

    /// Переобучение только одной категории (путь восстановления)
    pub fn retrain_shop_type(&self, registry: &ModelRegistry, shop_type: ShopType) -> usize {
        self.run_filtered(registry, Some(shop_type))
    }

    fn run_filtered(&self, registry: &ModelRegistry, only: Option<ShopType>) -> usize {
        let paths = match self.dataset_paths() {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!("Failed to scan datasets directory: {}", e);
                return 0;
            }
        };
        if paths.is_empty() {
            tracing::warn!("No dataset files found");
            return 0;
        }

        let mut committed = 0;
        for path in paths {
            let (key, table) = match dataset::load_dataset(&path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    tracing::error!("Error processing dataset {}: {}", path.display(), e);
                    continue;
                }
            };
            if let Some(shop_type) = only {
                if key.shop_type != shop_type {
                    continue;
                }
            }

            match self.train_partition(&key, &table) {
                Ok(artifact) => {
                    let name = key.encoded_name();
                    match registry.commit(key, artifact) {
                        Ok(()) => {
                            committed += 1;
                            tracing::info!("Model {} trained successfully", name);
                        }
                        Err(e) => tracing::error!("Failed to commit model {}: {}", name, e),
                    }
                }
                // Отсутствие данных — не сбой: реестр сохраняет прежний артефакт
                Err(EngineError::NoTrainingData(shop_type)) => {
                    tracing::warn!("No training data for {}", shop_type);
                }
                Err(e) => {
                    tracing::error!("Error training model for {}: {}", path.display(), e);
                }
            }
        }
        committed
    }

    fn dataset_paths(&self) -> Result<Vec<PathBuf>, std::io::Error> {
        let mut paths = Vec::new();
        if !self.datasets_dir.exists() {
            return Ok(paths);
        }

        for entry in std::fs::read_dir(&self.datasets_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("dataset_") && name.ends_with(".json") {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Обучение одной партиции: разбиение, масштабирование, поиск, победитель
    pub fn train_partition(
        &self,
        key: &PartitionKey,
        table: &TrainingTable,
    ) -> Result<ModelArtifact, EngineError> {
        if table.len() < MIN_TRAINING_ROWS {
            return Err(EngineError::NoTrainingData(key.shop_type));
        }
        tracing::info!(
            "Training model for {} ({}) in area {}, {} rows",
            key.shop_type,
            key.train_period(),
            key.bounds,
            table.len()
        );

        let (X, y) = table.to_arrays();
        let (train_idx, test_idx) = train_test_split(table.len(), TEST_RATIO, self.seed);

        let X_train = select_rows(&X, &train_idx);
        let y_train = select_targets(&y, &train_idx);
        let X_test = select_rows(&X, &test_idx);
        let y_test = select_targets(&y, &test_idx);

        // Скейлер обучается только на обучающей выборке
        let mut scaler = StandardScaler::new();
        let X_train_scaled = scaler.fit_transform(&X_train).map_err(EngineError::Training)?;
        let X_test_scaled = scaler.transform(&X_test).map_err(EngineError::Training)?;

        // Поиск лучшей модели: внутри семейства — кросс-валидация,
        // между семействами — счет на отложенной выборке
        let mut best: Option<(TrainedRegressor, f64)> = None;
        for family_grid in candidate_grid() {
            let mut family_best: Option<(CandidateParams, f64)> = None;
            for params in family_grid {
                match cross_validate(&params, &X_train_scaled, &y_train, self.seed) {
                    Ok(score) => {
                        if family_best.map_or(true, |(_, s)| score > s) {
                            family_best = Some((params, score));
                        }
                    }
                    Err(e) => tracing::warn!("Candidate {:?} failed: {}", params, e),
                }
            }
            let Some((params, cv_score)) = family_best else {
                continue;
            };

            // Дообучение лучшего кандидата на полной обучающей выборке
            let model = match params.fit(&X_train_scaled, &y_train, self.seed) {
                Ok(model) => model,
                Err(e) => {
                    tracing::warn!("Refit {:?} failed: {}", params, e);
                    continue;
                }
            };
            let predictions = model.predict(&X_test_scaled);
            let score = r2_score(&predictions, &y_test);
            tracing::info!(
                "Family {}: cv R2={:.4}, held-out R2={:.4}",
                model.family(),
                cv_score,
                score
            );

            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((model, score));
            }
        }

        let (model, _) = best
            .ok_or_else(|| EngineError::Training("all candidate families failed".to_string()))?;

        // Итоговые метрики на отложенной выборке
        let predictions = model.predict(&X_test_scaled);
        let mse = mean_squared_error(&predictions, &y_test);
        let metrics = ModelMetrics {
            mse,
            rmse: mse.sqrt(),
            r2: r2_score(&predictions, &y_test),
        };
        tracing::info!(
            "Metrics: MSE={:.4}, RMSE={:.4}, R2={:.4}",
            metrics.mse,
            metrics.rmse,
            metrics.r2
        );

        Ok(ModelArtifact {
            model,
            scaler,
            metrics,
            schema_version: FEATURE_SCHEMA_VERSION,
            trained_at: Utc::now(),
        })
    }
}

/// Детерминированное разбиение train/test с фиксированным зерном
pub fn train_test_split(n: usize, test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_size = ((n as f64 * test_ratio).round() as usize).max(1);
    let test = indices[..test_size].to_vec();
    let train = indices[test_size..].to_vec();
    (train, test)
}
