//! Анализ временных трендов

#![allow(non_snake_case)]

use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};

use crate::types::{HistoricalRecord, TrendResult};

/// Линейный тренд по историческому ряду: наклон + стабильность (R²).
/// Стабильность считается на тех же данных, что и подгонка — анализатор
/// характеризует гладкость истории, а не предсказывает будущее.
#[derive(Debug, Default)]
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    /// Горизонт в годах принимается для совместимости, но в подгонке не участвует
    pub fn analyze(&self, historical_data: &[HistoricalRecord], _years: i32) -> TrendResult {
        // Преобразование метки периода в числовую координату времени;
        // нечитаемые метки пропускаются
        let points: Vec<(f64, f64)> = historical_data
            .iter()
            .filter_map(|record| {
                parse_period(&record.period).map(|t| (t, record.total_objects as f64))
            })
            .collect();

        if points.len() < 2 {
            return TrendResult::default();
        }

        let n = points.len();
        let X = Array2::from_shape_fn((n, 1), |(i, _)| points[i].0);
        let y = Array1::from_shape_fn(n, |i| points[i].1);

        let dataset = Dataset::new(X.clone(), y.clone());
        let model = match LinearRegression::default().fit(&dataset) {
            Ok(model) => model,
            // Вырожденные данные не должны ронять предсказание
            Err(e) => {
                tracing::warn!("Trend fit failed: {}", e);
                return TrendResult::default();
            }
        };

        let predictions = model.predict(&X);

        TrendResult {
            slope: model.params()[0],
            stability: r_squared(&predictions, &y),
        }
    }
}

/// "YYYY-Qn" -> год + (n - 1) / 4, "YYYY" -> год
fn parse_period(period: &str) -> Option<f64> {
    match period.trim().split_once('-') {
        Some((year, quarter)) => {
            let year: f64 = year.parse().ok()?;
            let quarter: f64 = quarter.strip_prefix('Q')?.parse().ok()?;
            Some(year + (quarter - 1.0) / 4.0)
        }
        None => period.trim().parse().ok(),
    }
}

fn r_squared(predictions: &Array1<f64>, targets: &Array1<f64>) -> f64 {
    let mean = targets.mean().unwrap_or(0.0);
    let ss_tot: f64 = targets.iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot < 1e-12 {
        return 0.0;
    }

    let ss_res: f64 = predictions
        .iter()
        .zip(targets.iter())
        .map(|(p, y)| (y - p).powi(2))
        .sum();

    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(period: &str, total_objects: i64) -> HistoricalRecord {
        HistoricalRecord {
            period: period.to_string(),
            total_objects,
            new_objects: 0,
            closed_objects: 0,
        }
    }

    #[test]
    fn test_empty_series_yields_zero_trend() {
        let analyzer = TrendAnalyzer;
        assert_eq!(analyzer.analyze(&[], 5), TrendResult::default());
    }

    #[test]
    fn test_single_point_yields_zero_trend() {
        let analyzer = TrendAnalyzer;
        let result = analyzer.analyze(&[record("2020-Q1", 100)], 5);
        assert_eq!(result.slope, 0.0);
        assert_eq!(result.stability, 0.0);
    }

    #[test]
    fn test_perfect_linear_quarterly_series() {
        let analyzer = TrendAnalyzer;
        let records = vec![
            record("2020-Q1", 100),
            record("2020-Q2", 110),
            record("2020-Q3", 120),
            record("2020-Q4", 130),
        ];

        let result = analyzer.analyze(&records, 5);
        // Прирост 10 объектов за квартал = 40 объектов в год
        assert!((result.slope - 40.0).abs() < 1e-6);
        assert!((result.stability - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_plain_year_periods() {
        let analyzer = TrendAnalyzer;
        let records = vec![record("2020", 50), record("2021", 60), record("2022", 70)];

        let result = analyzer.analyze(&records, 5);
        assert!((result.slope - 10.0).abs() < 1e-6);
        assert!((result.stability - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unparseable_periods_are_skipped() {
        let analyzer = TrendAnalyzer;
        let records = vec![record("garbage", 10), record("2020-Q1", 100)];
        // Остается одна точка — вырожденный случай
        assert_eq!(analyzer.analyze(&records, 5), TrendResult::default());
    }

    #[test]
    fn test_noisy_series_has_lower_stability() {
        let analyzer = TrendAnalyzer;
        let records = vec![
            record("2020-Q1", 100),
            record("2020-Q2", 180),
            record("2020-Q3", 90),
            record("2020-Q4", 160),
        ];

        let result = analyzer.analyze(&records, 5);
        assert!(result.stability < 0.9);
    }

    #[test]
    fn test_parse_period_formats() {
        assert_eq!(parse_period("2020-Q1"), Some(2020.0));
        assert_eq!(parse_period("2020-Q3"), Some(2020.5));
        assert_eq!(parse_period("2021"), Some(2021.0));
        assert_eq!(parse_period("2020-3"), None);
        assert_eq!(parse_period(""), None);
    }
}
