//! Движок предсказаний: реестр моделей + аналитические модули

use crate::error::EngineError;
use crate::models::hotspots::HotspotDetector;
use crate::models::trend::TrendAnalyzer;
use crate::preprocessing::feature_vector::FeatureVector;
use crate::registry::ModelRegistry;
use crate::training::TrainingPipeline;
use crate::types::{BoundingBox, ModelInfo, PredictionRequest, PredictionResponse, TrendResult};

/// Оркестратор предсказания: разрешение модели, вектор признаков,
/// тренд и хотспоты в одном ответе
pub struct PredictionEngine {
    registry: ModelRegistry,
    pipeline: TrainingPipeline,
    trend_analyzer: TrendAnalyzer,
    hotspot_detector: HotspotDetector,
}

impl PredictionEngine {
    pub fn new(registry: ModelRegistry, pipeline: TrainingPipeline) -> Self {
        Self {
            registry,
            pipeline,
            trend_analyzer: TrendAnalyzer,
            hotspot_detector: HotspotDetector,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Основной метод предсказания
    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse, EngineError> {
        let bounds =
            BoundingBox::parse(&request.bbox).map_err(EngineError::InvalidBoundingBox)?;

        // Разрешение модели; категория без единого артефакта получает
        // одно синхронное переобучение и одну повторную попытку
        let (key, artifact) = match self.registry.resolve(request.shop_type, &bounds) {
            Ok(resolved) => resolved,
            Err(EngineError::ModelUnavailable(shop_type)) => {
                tracing::warn!("No model found for {}, training new model", shop_type);
                self.pipeline.retrain_shop_type(&self.registry, shop_type);
                self.registry.resolve(shop_type, &bounds)?
            }
            Err(e) => return Err(e),
        };
        tracing::info!("Using model: {}", key.encoded_name());

        // Вектор признаков и проверка схемы
        let vector = FeatureVector::from_feature_set(&request.features);
        artifact.check_schema(vector.len())?;
        let scaled = artifact
            .scaler
            .transform_row(vector.as_array())
            .map_err(EngineError::SchemaMismatch)?;

        let activity_level = artifact.model.predict_row(&scaled);

        // Анализ тренда по историческому ряду, если он передан
        let trend = if request.historical_data.is_empty() {
            TrendResult::default()
        } else {
            self.trend_analyzer
                .analyze(&request.historical_data, request.years)
        };

        // Хотспоты по координатам объектов
        let hotspots = self.hotspot_detector.detect(&request.features.elements);

        Ok(PredictionResponse {
            activity_level,
            trend_slope: trend.slope,
            trend_strength: trend.stability,
            hotspots,
            model_used: key.encoded_name(),
        })
    }

    /// Полное переобучение; вызывается фоновой задачей
    pub fn retrain_all(&self) -> usize {
        self.pipeline.run(&self.registry)
    }

    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.registry.list()
    }
}
