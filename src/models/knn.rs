//! k-nearest-neighbor regression on standardized inputs.
//!
//! Brute-force neighbor search; the dimensionality of this study (at most
//! 220 columns) keeps the scan cheap relative to model tuning elsewhere.

use aprender::preprocessing::StandardScaler;
use aprender::primitives::{Matrix, Vector};
use aprender::traits::Transformer;

use super::{ModelFamily, Regressor};
use crate::error::{Result, RuidoError};
use crate::tuning::{cross_val_rmse, select_best, TuningBudget};

pub struct KnnRegressor {
    k: usize,
    scaler: StandardScaler,
    x_train: Option<Matrix<f32>>,
    y_train: Vec<f32>,
}

impl KnnRegressor {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            scaler: StandardScaler::new().with_mean(true).with_std(true),
            x_train: None,
            y_train: Vec::new(),
        }
    }

    fn predict_one(&self, train: &Matrix<f32>, row: &[f32]) -> f32 {
        let (n_train, n_cols) = train.shape();
        let k = self.k.min(n_train);

        let mut distances: Vec<(f32, usize)> = (0..n_train)
            .map(|i| {
                let mut dist = 0.0f32;
                for (col, &v) in row.iter().enumerate().take(n_cols) {
                    let d = train.get(i, col) - v;
                    dist += d * d;
                }
                (dist, i)
            })
            .collect();
        distances.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        distances[..k]
            .iter()
            .map(|&(_, i)| self.y_train[i])
            .sum::<f32>()
            / k as f32
    }
}

impl Regressor for KnnRegressor {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let family = ModelFamily::Knn.name();
        if x.shape().0 == 0 {
            return Err(RuidoError::fit(family, "cannot fit with zero samples"));
        }
        let scaled = self
            .scaler
            .fit_transform(x)
            .map_err(|e| RuidoError::fit(family, e))?;
        self.x_train = Some(scaled);
        self.y_train = y.as_slice().to_vec();
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        let (n_rows, n_cols) = x.shape();
        let Some(train) = &self.x_train else {
            return Vector::from_vec(vec![0.0; n_rows]);
        };
        let scaled = match self.scaler.transform(x) {
            Ok(scaled) => scaled,
            Err(_) => return Vector::from_vec(vec![0.0; n_rows]),
        };

        let mut preds = Vec::with_capacity(n_rows);
        let data = scaled.as_slice();
        for row in 0..n_rows {
            let start = row * n_cols;
            preds.push(self.predict_one(train, &data[start..start + n_cols]));
        }
        Vector::from_vec(preds)
    }
}

/// Exhaustive grid over the neighbor count, 10-fold CV.
pub fn tune(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    budget: &TuningBudget,
    seed: u64,
) -> Result<KnnRegressor> {
    let n_rows = x.shape().0;
    let candidates: Vec<usize> = [1usize, 3, 5, 7, 9, 11, 15, 19, 25]
        .into_iter()
        .filter(|&k| k < n_rows)
        .collect();

    let folds = budget.folds_for(n_rows);
    let (k, cv) = select_best(ModelFamily::Knn, candidates, |&k| {
        cross_val_rmse(x, y, folds, seed, |train_x, train_y, val_x| {
            let mut model = KnnRegressor::new(k);
            model.fit(train_x, train_y)?;
            Ok(model.predict(val_x))
        })
    })?;
    tracing::debug!(k, cv, "knn tuned");

    let mut model = KnnRegressor::new(k);
    model.fit(x, y)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_neighbor_memorizes_training_data() {
        let x = Matrix::from_vec(4, 1, vec![0.0, 1.0, 2.0, 3.0]).expect("matrix");
        let y = Vector::from_slice(&[10.0, 20.0, 30.0, 40.0]);
        let mut model = KnnRegressor::new(1);
        model.fit(&x, &y).expect("fit");
        let pred = model.predict(&x);
        for (p, t) in pred.as_slice().iter().zip(y.as_slice()) {
            assert!((p - t).abs() < 1e-5);
        }
    }

    #[test]
    fn test_k_equal_to_n_predicts_global_mean() {
        let x = Matrix::from_vec(4, 1, vec![0.0, 1.0, 2.0, 3.0]).expect("matrix");
        let y = Vector::from_slice(&[1.0, 2.0, 3.0, 6.0]);
        let mut model = KnnRegressor::new(4);
        model.fit(&x, &y).expect("fit");
        let pred = model.predict(&x);
        for &p in pred.as_slice() {
            assert!((p - 3.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_knn_has_no_selection_capability() {
        let x = Matrix::from_vec(3, 1, vec![0.0, 1.0, 2.0]).expect("matrix");
        let y = Vector::from_slice(&[1.0, 2.0, 3.0]);
        let mut model = KnnRegressor::new(1);
        model.fit(&x, &y).expect("fit");
        assert_eq!(model.selected(&["x1".to_string()]), None);
    }
}
