//! Классификация ошибок движка предсказаний

use thiserror::Error;

use crate::types::ShopType;

/// Ошибки ядра: эскалируемые условия отделены от локально поглощаемых.
/// Нехватка исторических точек и отсутствие координат ошибками не являются —
/// они дают нулевой/пустой результат на месте.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Для категории нет ни одного артефакта; эскалируется вызывающей стороне
    #[error("no model available for shop type: {0}")]
    ModelUnavailable(ShopType),

    #[error("invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    /// Схема признаков артефакта расходится с текущей схемой; фатально
    #[error("feature schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Нет данных для обучения партиции; логируется, пайплайн продолжается
    #[error("no training data for shop type: {0}")]
    NoTrainingData(ShopType),

    #[error("training failed: {0}")]
    Training(String),

    #[error("invalid artifact name: {0}")]
    InvalidArtifactName(String),

    #[error("artifact store error: {0}")]
    Store(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
