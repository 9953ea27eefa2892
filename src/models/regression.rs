//! Кандидатные семейства регрессоров

#![allow(non_snake_case)]

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Количество случайных порогов на признак при поиске разбиения
const THRESHOLD_TRIES: usize = 10;
/// Минимальный размер узла для разбиения
const MIN_SAMPLES_SPLIT: usize = 5;
/// Глубина деревьев в бустинге
const BOOSTING_TREE_DEPTH: usize = 3;
/// Количество эпох субградиентного спуска SVR
const SVR_EPOCHS: usize = 200;

/// Узел регрессионного дерева
#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Регрессионное дерево: критерий MSE, случайные пороги-кандидаты
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    max_depth: usize,
    min_samples_split: usize,
    root: Option<TreeNode>,
}

impl RegressionTree {
    fn new(max_depth: usize, min_samples_split: usize) -> Self {
        Self {
            max_depth,
            min_samples_split,
            root: None,
        }
    }

    fn fit(
        &mut self,
        X: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        rng: &mut StdRng,
    ) -> Result<(), String> {
        if indices.is_empty() {
            return Err("Empty dataset".to_string());
        }

        self.root = Some(self.build_tree(X, y, 0, indices.to_vec(), rng));
        Ok(())
    }

    fn build_tree(
        &self,
        X: &Array2<f64>,
        y: &Array1<f64>,
        depth: usize,
        indices: Vec<usize>,
        rng: &mut StdRng,
    ) -> TreeNode {
        if depth >= self.max_depth || indices.len() < self.min_samples_split {
            // Лист: среднее значение
            let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;
            return TreeNode::Leaf { value: mean };
        }

        // Поиск лучшего разделения
        let mut best_feature = 0;
        let mut best_threshold = 0.0;
        let mut best_score = f64::INFINITY;

        for feature in 0..X.ncols() {
            let values: Vec<f64> = indices.iter().map(|&i| X[[i, feature]]).collect();
            let min_val = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max_val = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            if (max_val - min_val).abs() < 1e-10 {
                continue;
            }

            // Пробуем несколько порогов
            for _ in 0..THRESHOLD_TRIES {
                let threshold = rng.gen_range(min_val..=max_val);

                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| X[[i, feature]] < threshold);

                if left_indices.is_empty() || right_indices.is_empty() {
                    continue;
                }

                // Суммарный разброс вокруг средних по сторонам
                let left_mean =
                    left_indices.iter().map(|&i| y[i]).sum::<f64>() / left_indices.len() as f64;
                let right_mean =
                    right_indices.iter().map(|&i| y[i]).sum::<f64>() / right_indices.len() as f64;

                let left_sse: f64 = left_indices
                    .iter()
                    .map(|&i| (y[i] - left_mean).powi(2))
                    .sum();
                let right_sse: f64 = right_indices
                    .iter()
                    .map(|&i| (y[i] - right_mean).powi(2))
                    .sum();
                let total = left_sse + right_sse;

                if total < best_score {
                    best_score = total;
                    best_feature = feature;
                    best_threshold = threshold;
                }
            }
        }

        if best_score == f64::INFINITY {
            // Не удалось найти разделение
            let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;
            return TreeNode::Leaf { value: mean };
        }

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| X[[i, best_feature]] < best_threshold);

        TreeNode::Split {
            feature: best_feature,
            threshold: best_threshold,
            left: Box::new(self.build_tree(X, y, depth + 1, left_indices, rng)),
            right: Box::new(self.build_tree(X, y, depth + 1, right_indices, rng)),
        }
    }

    fn predict_row(&self, sample: &Array1<f64>) -> f64 {
        match &self.root {
            Some(root) => Self::predict_node(root, sample),
            None => 0.0,
        }
    }

    fn predict_node(node: &TreeNode, sample: &Array1<f64>) -> f64 {
        match node {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] < *threshold {
                    Self::predict_node(left, sample)
                } else {
                    Self::predict_node(right, sample)
                }
            }
        }
    }
}

/// Гиперпараметры леса
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
}

/// Ансамбль bagging-деревьев
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestRegressor {
    params: ForestParams,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl ForestRegressor {
    pub fn fit(
        params: ForestParams,
        X: &Array2<f64>,
        y: &Array1<f64>,
        rng: &mut StdRng,
    ) -> Result<Self, String> {
        let n_samples = X.nrows();
        if n_samples == 0 {
            return Err("Empty dataset".to_string());
        }

        let max_depth = params.max_depth.unwrap_or(usize::MAX);
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            // Bootstrap-выборка строк
            let indices: Vec<usize> = (0..n_samples)
                .map(|_| rng.gen_range(0..n_samples))
                .collect();

            let mut tree = RegressionTree::new(max_depth, MIN_SAMPLES_SPLIT);
            tree.fit(X, y, &indices, rng)?;
            trees.push(tree);
        }

        Ok(Self {
            params,
            trees,
            n_features: X.ncols(),
        })
    }

    pub fn predict_row(&self, sample: &Array1<f64>) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(sample)).sum();
        sum / self.trees.len() as f64
    }
}

/// Гиперпараметры градиентного бустинга
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
}

/// Градиентный бустинг: базовое среднее + неглубокие деревья по остаткам
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    params: BoostingParams,
    base_prediction: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl GradientBoosting {
    pub fn fit(
        params: BoostingParams,
        X: &Array2<f64>,
        y: &Array1<f64>,
        rng: &mut StdRng,
    ) -> Result<Self, String> {
        let n_samples = X.nrows();
        if n_samples == 0 {
            return Err("Empty dataset".to_string());
        }

        let base_prediction = y.mean().unwrap_or(0.0);
        let all_indices: Vec<usize> = (0..n_samples).collect();

        let mut predictions = Array1::from_elem(n_samples, base_prediction);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let residuals = y - &predictions;

            let mut tree = RegressionTree::new(BOOSTING_TREE_DEPTH, MIN_SAMPLES_SPLIT);
            tree.fit(X, &residuals, &all_indices, rng)?;

            for i in 0..n_samples {
                let sample = X.row(i).to_owned();
                predictions[i] += params.learning_rate * tree.predict_row(&sample);
            }
            trees.push(tree);
        }

        Ok(Self {
            params,
            base_prediction,
            trees,
            n_features: X.ncols(),
        })
    }

    pub fn predict_row(&self, sample: &Array1<f64>) -> f64 {
        let boost: f64 = self.trees.iter().map(|t| t.predict_row(sample)).sum();
        self.base_prediction + self.params.learning_rate * boost
    }
}

/// Гиперпараметры SVR
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvrParams {
    pub c: f64,
    pub epsilon: f64,
}

/// Линейный SVR: epsilon-нечувствительная функция потерь, субградиентный спуск
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvr {
    params: SvrParams,
    weights: Vec<f64>,
    bias: f64,
}

impl LinearSvr {
    pub fn fit(
        params: SvrParams,
        X: &Array2<f64>,
        y: &Array1<f64>,
        rng: &mut StdRng,
    ) -> Result<Self, String> {
        let n_samples = X.nrows();
        let n_features = X.ncols();
        if n_samples == 0 || n_features == 0 {
            return Err("Empty dataset".to_string());
        }

        let mut weights = vec![0.0; n_features];
        let mut bias = 0.0;
        // Коэффициент L2-регуляризации из C
        let lambda = 1.0 / (params.c * n_samples as f64);

        let mut order: Vec<usize> = (0..n_samples).collect();
        let mut learning_rate = 0.1;

        for _ in 0..SVR_EPOCHS {
            order.shuffle(rng);

            for &i in &order {
                let mut prediction = bias;
                for j in 0..n_features {
                    prediction += weights[j] * X[[i, j]];
                }
                let error = prediction - y[i];

                // Субградиент epsilon-нечувствительной потери
                let direction = if error > params.epsilon {
                    1.0
                } else if error < -params.epsilon {
                    -1.0
                } else {
                    0.0
                };

                for j in 0..n_features {
                    let gradient = lambda * weights[j] + direction * X[[i, j]];
                    weights[j] -= learning_rate * gradient;
                }
                bias -= learning_rate * direction;
            }

            // Затухание шага
            learning_rate *= 0.99;
        }

        Ok(Self {
            params,
            weights,
            bias,
        })
    }

    pub fn predict_row(&self, sample: &Array1<f64>) -> f64 {
        let mut prediction = self.bias;
        for (j, weight) in self.weights.iter().enumerate() {
            prediction += weight * sample[j];
        }
        prediction
    }
}

/// Обученный регрессор одного из кандидатных семейств
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedRegressor {
    Forest(ForestRegressor),
    Boosting(GradientBoosting),
    Svr(LinearSvr),
}

impl TrainedRegressor {
    pub fn predict_row(&self, sample: &Array1<f64>) -> f64 {
        match self {
            TrainedRegressor::Forest(model) => model.predict_row(sample),
            TrainedRegressor::Boosting(model) => model.predict_row(sample),
            TrainedRegressor::Svr(model) => model.predict_row(sample),
        }
    }

    pub fn predict(&self, X: &Array2<f64>) -> Array1<f64> {
        Array1::from_shape_fn(X.nrows(), |i| self.predict_row(&X.row(i).to_owned()))
    }

    pub fn n_features(&self) -> usize {
        match self {
            TrainedRegressor::Forest(model) => model.n_features,
            TrainedRegressor::Boosting(model) => model.n_features,
            TrainedRegressor::Svr(model) => model.weights.len(),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            TrainedRegressor::Forest(_) => "forest",
            TrainedRegressor::Boosting(_) => "boosting",
            TrainedRegressor::Svr(_) => "svr",
        }
    }
}

/// Гиперпараметры кандидата; обучение всегда идет с фиксированным зерном
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CandidateParams {
    Forest(ForestParams),
    Boosting(BoostingParams),
    Svr(SvrParams),
}

impl CandidateParams {
    pub fn family(&self) -> &'static str {
        match self {
            CandidateParams::Forest(_) => "forest",
            CandidateParams::Boosting(_) => "boosting",
            CandidateParams::Svr(_) => "svr",
        }
    }

    pub fn fit(&self, X: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<TrainedRegressor, String> {
        let mut rng = StdRng::seed_from_u64(seed);
        match self {
            CandidateParams::Forest(params) => {
                ForestRegressor::fit(*params, X, y, &mut rng).map(TrainedRegressor::Forest)
            }
            CandidateParams::Boosting(params) => {
                GradientBoosting::fit(*params, X, y, &mut rng).map(TrainedRegressor::Boosting)
            }
            CandidateParams::Svr(params) => {
                LinearSvr::fit(*params, X, y, &mut rng).map(TrainedRegressor::Svr)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Гладкая зависимость от двух признаков
    fn sample_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let X = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                i as f64 / n as f64
            } else {
                ((i * 7) % n) as f64 / n as f64
            }
        });
        let y = Array1::from_shape_fn(n, |i| 2.0 * X[[i, 0]] + 0.5 * X[[i, 1]]);
        (X, y)
    }

    fn r2(model: &TrainedRegressor, X: &Array2<f64>, y: &Array1<f64>) -> f64 {
        let predictions = model.predict(X);
        let mean = y.mean().unwrap();
        let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
        let ss_res: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, v)| (v - p).powi(2))
            .sum();
        1.0 - ss_res / ss_tot
    }

    #[test]
    fn test_forest_learns_smooth_target() {
        let (X, y) = sample_data(60);
        let params = CandidateParams::Forest(ForestParams {
            n_trees: 50,
            max_depth: Some(10),
        });
        let model = params.fit(&X, &y, 42).unwrap();
        assert!(r2(&model, &X, &y) > 0.7);
    }

    #[test]
    fn test_boosting_learns_smooth_target() {
        let (X, y) = sample_data(60);
        let params = CandidateParams::Boosting(BoostingParams {
            n_estimators: 100,
            learning_rate: 0.1,
        });
        let model = params.fit(&X, &y, 42).unwrap();
        assert!(r2(&model, &X, &y) > 0.7);
    }

    #[test]
    fn test_svr_learns_linear_target() {
        let (X, y) = sample_data(60);
        let params = CandidateParams::Svr(SvrParams { c: 10.0, epsilon: 0.01 });
        let model = params.fit(&X, &y, 42).unwrap();
        assert!(r2(&model, &X, &y) > 0.5);
    }

    #[test]
    fn test_fit_is_reproducible_with_fixed_seed() {
        let (X, y) = sample_data(40);
        let params = CandidateParams::Forest(ForestParams {
            n_trees: 20,
            max_depth: Some(5),
        });

        let first = params.fit(&X, &y, 42).unwrap();
        let second = params.fit(&X, &y, 42).unwrap();

        let sample = X.row(3).to_owned();
        assert_eq!(first.predict_row(&sample), second.predict_row(&sample));
    }

    #[test]
    fn test_empty_dataset_is_rejected() {
        let X = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        let params = CandidateParams::Forest(ForestParams {
            n_trees: 5,
            max_depth: None,
        });
        assert!(params.fit(&X, &y, 42).is_err());
    }

    #[test]
    fn test_regressor_serialization_roundtrip() {
        let (X, y) = sample_data(40);
        let params = CandidateParams::Boosting(BoostingParams {
            n_estimators: 30,
            learning_rate: 0.1,
        });
        let model = params.fit(&X, &y, 42).unwrap();

        let encoded = serde_json::to_string(&model).unwrap();
        let decoded: TrainedRegressor = serde_json::from_str(&encoded).unwrap();

        let sample = X.row(5).to_owned();
        assert!((model.predict_row(&sample) - decoded.predict_row(&sample)).abs() < 1e-12);
        assert_eq!(decoded.n_features(), 2);
        assert_eq!(decoded.family(), "boosting");
    }
}
