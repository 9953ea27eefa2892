//! Типы данных для ML модуля

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Тип заведения (закрытый набор категорий)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShopType {
    Supermarket,
    Restaurant,
    Clothing,
}

impl ShopType {
    pub const ALL: [ShopType; 3] = [
        ShopType::Supermarket,
        ShopType::Restaurant,
        ShopType::Clothing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShopType::Supermarket => "supermarket",
            ShopType::Restaurant => "restaurant",
            ShopType::Clothing => "clothing",
        }
    }
}

impl fmt::Display for ShopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShopType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "supermarket" => Ok(ShopType::Supermarket),
            "restaurant" => Ok(ShopType::Restaurant),
            "clothing" => Ok(ShopType::Clothing),
            other => Err(format!("unknown shop type: {}", other)),
        }
    }
}

/// Географическая рамка; инвариант: min <= max по обеим осям
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        // Нормализуем порядок координат
        Self {
            min_lat: min_lat.min(max_lat),
            min_lon: min_lon.min(max_lon),
            max_lat: min_lat.max(max_lat),
            max_lon: min_lon.max(max_lon),
        }
    }

    /// Разбор строки формата "min_lat,min_lon,max_lat,max_lon"
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!(
                "expected 4 comma-separated coordinates, got {}",
                parts.len()
            ));
        }

        let mut values = [0.0_f64; 4];
        for (i, part) in parts.iter().enumerate() {
            values[i] = part
                .parse()
                .map_err(|_| format!("invalid coordinate: {}", part))?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }

    /// Полное вложение другой рамки в текущую
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min_lat <= other.min_lat
            && self.max_lat >= other.max_lat
            && self.min_lon <= other.min_lon
            && self.max_lon >= other.max_lon
    }

    /// Объединяющая рамка (для ключей партиций из нескольких кластеров)
    pub fn envelope(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_lat: self.min_lat.min(other.min_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lat: self.max_lat.max(other.max_lat),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialFeatures {
    pub total_objects: i64,
    pub avg_area: f64,
    pub subway_stations: i64,
    pub avg_dist_to_subway: f64,
    pub avg_dist_to_primary: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalFeatures {
    pub years_analyzed: i32,
    pub object_density: f64,
    pub new_object_rate: f64,
    pub closure_rate: f64,
    pub net_growth_rate: f64,
    pub trend_slope: f64,
}

/// Объект OSM; координаты могут отсутствовать
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OsmElement {
    pub id: i64,
    #[serde(rename = "type")]
    pub element_type: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub tags: HashMap<String, String>,
}

/// Вложенный набор признаков области
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSet {
    pub spatial: SpatialFeatures,
    pub temporal: TemporalFeatures,
    pub elements: Vec<OsmElement>,
}

/// Запись исторического ряда: метка периода ("YYYY" или "YYYY-Qn") и количество объектов
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub period: String,
    pub total_objects: i64,
    #[serde(default)]
    pub new_objects: i64,
    #[serde(default)]
    pub closed_objects: i64,
}

/// Результат анализа тренда
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub slope: f64,
    pub stability: f64,
}

/// Центр кластера плотности с нормированным score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub lat: f64,
    pub lon: f64,
    pub score: f64,
}

/// Метрики качества модели на отложенной выборке
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRequest {
    pub shop_type: ShopType,
    pub bbox: String,
    #[serde(default)]
    pub features: FeatureSet,
    #[serde(default)]
    pub historical_data: Vec<HistoricalRecord>,
    #[serde(default = "default_years")]
    pub years: i32,
}

fn default_years() -> i32 {
    5
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub activity_level: f64,
    pub trend_slope: f64,
    pub trend_strength: f64,
    pub hotspots: Vec<Hotspot>,
    pub model_used: String,
}

/// Описание артефакта для списка моделей
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub shop_type: ShopType,
    pub train_period: String,
    pub bbox: String,
    pub metrics: ModelMetrics,
}
