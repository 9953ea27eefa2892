//! Поиск гиперпараметров с кросс-валидацией

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, Axis};

use crate::models::regression::{BoostingParams, CandidateParams, ForestParams, SvrParams};

/// Количество фолдов кросс-валидации
pub const CV_FOLDS: usize = 5;

/// Сетки кандидатов по семействам: лес, градиентный бустинг, SVR
pub fn candidate_grid() -> Vec<Vec<CandidateParams>> {
    let mut forest = Vec::new();
    for &n_trees in &[100, 200] {
        for &max_depth in &[None, Some(10), Some(20)] {
            forest.push(CandidateParams::Forest(ForestParams { n_trees, max_depth }));
        }
    }

    let mut boosting = Vec::new();
    for &n_estimators in &[100, 200] {
        for &learning_rate in &[0.01, 0.1] {
            boosting.push(CandidateParams::Boosting(BoostingParams {
                n_estimators,
                learning_rate,
            }));
        }
    }

    let mut svr = Vec::new();
    for &c in &[0.1, 1.0, 10.0] {
        for &epsilon in &[0.01, 0.1] {
            svr.push(CandidateParams::Svr(SvrParams { c, epsilon }));
        }
    }

    vec![forest, boosting, svr]
}

/// Средний R² кандидата по фолдам
pub fn cross_validate(
    params: &CandidateParams,
    X: &Array2<f64>,
    y: &Array1<f64>,
    seed: u64,
) -> Result<f64, String> {
    let n = X.nrows();
    let folds = CV_FOLDS.min(n);
    if folds < 2 {
        return Err("not enough samples for cross-validation".to_string());
    }

    let mut scores = Vec::with_capacity(folds);
    for fold in 0..folds {
        let (train_idx, val_idx) = fold_indices(n, folds, fold);

        let X_train = select_rows(X, &train_idx);
        let y_train = select_targets(y, &train_idx);
        let X_val = select_rows(X, &val_idx);
        let y_val = select_targets(y, &val_idx);

        let model = params.fit(&X_train, &y_train, seed)?;
        let predictions = model.predict(&X_val);
        scores.push(r2_score(&predictions, &y_val));
    }

    Ok(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Непрерывные фолды; строки предполагаются заранее перемешанными
fn fold_indices(n: usize, folds: usize, fold: usize) -> (Vec<usize>, Vec<usize>) {
    let start = fold * n / folds;
    let end = (fold + 1) * n / folds;

    let val: Vec<usize> = (start..end).collect();
    let train: Vec<usize> = (0..n).filter(|i| *i < start || *i >= end).collect();
    (train, val)
}

pub fn select_rows(X: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    X.select(Axis(0), indices)
}

pub fn select_targets(y: &Array1<f64>, indices: &[usize]) -> Array1<f64> {
    y.select(Axis(0), indices)
}

/// Коэффициент детерминации
pub fn r2_score(predictions: &Array1<f64>, targets: &Array1<f64>) -> f64 {
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

pub fn mean_squared_error(predictions: &Array1<f64>, targets: &Array1<f64>) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }

    predictions
        .iter()
        .zip(targets.iter())
        .map(|(p, y)| (p - y).powi(2))
        .sum::<f64>()
        / targets.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_grid_covers_three_families() {
        let grid = candidate_grid();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0].len(), 6);
        assert_eq!(grid[1].len(), 4);
        assert_eq!(grid[2].len(), 6);
        assert!(grid[0].iter().all(|p| p.family() == "forest"));
        assert!(grid[1].iter().all(|p| p.family() == "boosting"));
        assert!(grid[2].iter().all(|p| p.family() == "svr"));
    }

    #[test]
    fn test_fold_indices_partition_all_rows() {
        let n = 23;
        let mut seen = vec![false; n];
        for fold in 0..CV_FOLDS {
            let (train, val) = fold_indices(n, CV_FOLDS, fold);
            assert!(!val.is_empty());
            assert_eq!(train.len() + val.len(), n);
            for i in val {
                assert!(!seen[i]);
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|v| *v));
    }

    #[test]
    fn test_r2_of_perfect_fit_is_one() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert!((r2_score(&y, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_r2_of_mean_prediction_is_zero() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        let mean = array![2.5, 2.5, 2.5, 2.5];
        assert!(r2_score(&mean, &y).abs() < 1e-12);
    }

    #[test]
    fn test_mse_computation() {
        let predictions = array![10.0, 20.0, 30.0];
        let targets = array![12.0, 18.0, 32.0];
        assert!((mean_squared_error(&predictions, &targets) - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_cross_validate_rejects_tiny_samples() {
        let X = array![[1.0]];
        let y = array![1.0];
        let params = CandidateParams::Svr(SvrParams {
            c: 1.0,
            epsilon: 0.1,
        });
        assert!(cross_validate(&params, &X, &y, 42).is_err());
    }

    #[test]
    fn test_cross_validate_scores_learnable_target() {
        let n = 30;
        let X = Array2::from_shape_fn((n, 2), |(i, j)| ((i * (j + 2)) % n) as f64 / n as f64);
        let y = Array1::from_shape_fn(n, |i| 3.0 * X[[i, 0]] + X[[i, 1]]);

        let params = CandidateParams::Svr(SvrParams {
            c: 10.0,
            epsilon: 0.01,
        });
        let score = cross_validate(&params, &X, &y, 42).unwrap();
        assert!(score > 0.3, "cv score too low: {}", score);
    }
}
