//! Генерация хотспотов через кластеризацию DBSCAN

use std::collections::HashMap;

use linfa::traits::Transformer;
use linfa_clustering::Dbscan;
use ndarray::Array2;

use crate::types::{Hotspot, OsmElement};

/// Радиус соседства в градусах
const NEIGHBORHOOD_EPS: f64 = 0.01;
/// Минимальное количество точек в кластере
const MIN_CLUSTER_POINTS: usize = 3;
/// Насыщение score: 20 точек = 1.0
const SCORE_SATURATION: f64 = 20.0;
/// Максимальное количество хотспотов в ответе
const MAX_HOTSPOTS: usize = 10;

/// Детектор пространственных хотспотов по координатам объектов
#[derive(Debug, Default)]
pub struct HotspotDetector;

impl HotspotDetector {
    pub fn detect(&self, elements: &[OsmElement]) -> Vec<Hotspot> {
        // Отбрасываем элементы без координат
        let coords: Vec<[f64; 2]> = elements
            .iter()
            .filter_map(|el| match (el.lat, el.lon) {
                (Some(lat), Some(lon)) => Some([lat, lon]),
                _ => None,
            })
            .collect();

        // Кластеризация меньшего количества точек не имеет смысла
        if coords.len() < MIN_CLUSTER_POINTS {
            return Vec::new();
        }

        let observations = Array2::from_shape_fn((coords.len(), 2), |(i, j)| coords[i][j]);

        let labels = match Dbscan::params(MIN_CLUSTER_POINTS)
            .tolerance(NEIGHBORHOOD_EPS)
            .transform(&observations)
        {
            Ok(labels) => labels,
            // Сбой кластеризации не должен ронять предсказание
            Err(e) => {
                tracing::warn!("DBSCAN failed: {}", e);
                return Vec::new();
            }
        };

        // Группировка точек по кластерам; шум (None) пропускается
        let mut clusters: HashMap<usize, Vec<[f64; 2]>> = HashMap::new();
        for (i, label) in labels.iter().enumerate() {
            if let Some(cluster_id) = label {
                clusters.entry(*cluster_id).or_default().push(coords[i]);
            }
        }

        let mut hotspots: Vec<Hotspot> = clusters
            .into_values()
            .map(|points| {
                let n = points.len() as f64;
                Hotspot {
                    lat: points.iter().map(|p| p[0]).sum::<f64>() / n,
                    lon: points.iter().map(|p| p[1]).sum::<f64>() / n,
                    score: (n / SCORE_SATURATION).min(1.0),
                }
            })
            .collect();

        // Сортировка по убыванию score, топ-10
        hotspots.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hotspots.truncate(MAX_HOTSPOTS);
        hotspots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(lat: f64, lon: f64) -> OsmElement {
        OsmElement {
            lat: Some(lat),
            lon: Some(lon),
            ..OsmElement::default()
        }
    }

    fn element_without_coords() -> OsmElement {
        OsmElement::default()
    }

    /// Плотная группа точек вокруг центра
    fn cluster_around(lat: f64, lon: f64, count: usize) -> Vec<OsmElement> {
        (0..count)
            .map(|i| element(lat + i as f64 * 1e-4, lon + i as f64 * 1e-4))
            .collect()
    }

    #[test]
    fn test_empty_input_yields_no_hotspots() {
        let detector = HotspotDetector;
        assert!(detector.detect(&[]).is_empty());
    }

    #[test]
    fn test_fewer_than_three_usable_points_yields_no_hotspots() {
        let detector = HotspotDetector;
        let elements = vec![element(55.75, 37.62), element(55.76, 37.63)];
        assert!(detector.detect(&elements).is_empty());
    }

    #[test]
    fn test_elements_without_coordinates_are_discarded() {
        let detector = HotspotDetector;
        let mut elements = vec![element(55.75, 37.62), element(55.7501, 37.6201)];
        for _ in 0..5 {
            elements.push(element_without_coords());
        }
        // Пригодных точек только две
        assert!(detector.detect(&elements).is_empty());
    }

    #[test]
    fn test_tight_cluster_of_25_points_saturates_score() {
        let detector = HotspotDetector;
        let elements = cluster_around(55.75, 37.62, 25);

        let hotspots = detector.detect(&elements);
        assert_eq!(hotspots.len(), 1);
        assert_eq!(hotspots[0].score, 1.0);

        // Центроид — среднее арифметическое координат
        let expected_lat: f64 =
            elements.iter().map(|e| e.lat.unwrap()).sum::<f64>() / elements.len() as f64;
        let expected_lon: f64 =
            elements.iter().map(|e| e.lon.unwrap()).sum::<f64>() / elements.len() as f64;
        assert!((hotspots[0].lat - expected_lat).abs() < 1e-9);
        assert!((hotspots[0].lon - expected_lon).abs() < 1e-9);
    }

    #[test]
    fn test_partial_cluster_score_is_proportional() {
        let detector = HotspotDetector;
        let hotspots = detector.detect(&cluster_around(55.75, 37.62, 10));
        assert_eq!(hotspots.len(), 1);
        assert!((hotspots[0].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_noise_points_produce_no_hotspot() {
        let detector = HotspotDetector;
        let mut elements = cluster_around(55.75, 37.62, 5);
        // Две изолированные точки далеко от кластера и друг от друга
        elements.push(element(50.0, 30.0));
        elements.push(element(60.0, 40.0));

        let hotspots = detector.detect(&elements);
        assert_eq!(hotspots.len(), 1);
    }

    #[test]
    fn test_output_sorted_and_truncated_to_ten() {
        let detector = HotspotDetector;
        let mut elements = Vec::new();
        // 12 кластеров разного размера, разнесенные на градус
        for k in 0..12 {
            elements.extend(cluster_around(10.0 + k as f64, 20.0 + k as f64, 4 + k));
        }

        let hotspots = detector.detect(&elements);
        assert_eq!(hotspots.len(), 10);
        for pair in hotspots.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}
