//! Нормализация данных

#![allow(non_snake_case)]

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Стандартизация признаков: нулевое среднее, единичная дисперсия.
/// Параметры фиксируются при fit и сохраняются вместе с моделью.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            mean: Vec::new(),
            std: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, X: &Array2<f64>) -> Result<(), String> {
        let n_samples = X.nrows();
        let n_features = X.ncols();

        if n_samples == 0 || n_features == 0 {
            return Err("Empty dataset".to_string());
        }

        // Среднее и стандартное отклонение по каждому признаку
        let mut mean = vec![0.0; n_features];
        for row in X.rows() {
            for (j, value) in row.iter().enumerate() {
                mean[j] += value;
            }
        }
        for value in mean.iter_mut() {
            *value /= n_samples as f64;
        }

        let mut std = vec![0.0; n_features];
        for row in X.rows() {
            for (j, value) in row.iter().enumerate() {
                std[j] += (value - mean[j]).powi(2);
            }
        }
        for value in std.iter_mut() {
            *value = (*value / n_samples as f64).sqrt();
            // Избегаем деления на ноль для константных признаков
            if *value < 1e-10 {
                *value = 1.0;
            }
        }

        self.mean = mean;
        self.std = std;
        self.is_fitted = true;
        Ok(())
    }

    pub fn transform(&self, X: &Array2<f64>) -> Result<Array2<f64>, String> {
        if !self.is_fitted {
            return Err("Scaler not fitted".to_string());
        }
        if X.ncols() != self.mean.len() {
            return Err(format!(
                "scaler expects {} features, got {}",
                self.mean.len(),
                X.ncols()
            ));
        }

        // Нормализация: (X - mean) / std
        let mut normalized = X.clone();
        for mut row in normalized.rows_mut() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = (*value - self.mean[j]) / self.std[j];
            }
        }

        Ok(normalized)
    }

    pub fn fit_transform(&mut self, X: &Array2<f64>) -> Result<Array2<f64>, String> {
        self.fit(X)?;
        self.transform(X)
    }

    /// Нормализация одного вектора признаков
    pub fn transform_row(&self, x: &Array1<f64>) -> Result<Array1<f64>, String> {
        if !self.is_fitted {
            return Err("Scaler not fitted".to_string());
        }
        if x.len() != self.mean.len() {
            return Err(format!(
                "scaler expects {} features, got {}",
                self.mean.len(),
                x.len()
            ));
        }

        let mut normalized = x.clone();
        for (j, value) in normalized.iter_mut().enumerate() {
            *value = (*value - self.mean[j]) / self.std[j];
        }

        Ok(normalized)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std(&self) -> &[f64] {
        &self.std
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}
