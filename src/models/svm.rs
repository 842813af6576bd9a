//! Radial-basis kernel machine (the svmRadial analog).
//!
//! Fitted in closed form as a kernel ridge problem: alpha solves
//! (K + lambda I) alpha = y - mean(y) with an RBF kernel on standardized
//! inputs, via `Matrix::cholesky_solve`. The ridge term doubles as the
//! positive-definiteness guard for the solver.

use aprender::preprocessing::StandardScaler;
use aprender::primitives::{Matrix, Vector};
use aprender::traits::Transformer;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{ModelFamily, Regressor};
use crate::error::{Result, RuidoError};
use crate::tuning::{cross_val_rmse, log_uniform, select_best, TuningBudget};

pub struct SvmRadialModel {
    gamma: f32,
    lambda: f32,
    scaler: StandardScaler,
    x_train: Option<Matrix<f32>>,
    alpha: Vec<f32>,
    y_mean: f32,
}

impl SvmRadialModel {
    pub fn new(gamma: f32, lambda: f32) -> Self {
        Self {
            gamma,
            lambda,
            scaler: StandardScaler::new().with_mean(true).with_std(true),
            x_train: None,
            alpha: Vec::new(),
            y_mean: 0.0,
        }
    }

    fn squared_distance(a: &Matrix<f32>, i: usize, b: &Matrix<f32>, j: usize, n_cols: usize) -> f32 {
        let mut dist = 0.0f32;
        for col in 0..n_cols {
            let d = a.get(i, col) - b.get(j, col);
            dist += d * d;
        }
        dist
    }
}

impl Regressor for SvmRadialModel {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let family = ModelFamily::Svm.name();
        let (n_rows, n_cols) = x.shape();
        if n_rows == 0 {
            return Err(RuidoError::fit(family, "cannot fit with zero samples"));
        }

        let scaled = self
            .scaler
            .fit_transform(x)
            .map_err(|e| RuidoError::fit(family, e))?;

        let mut kernel = Matrix::zeros(n_rows, n_rows);
        for i in 0..n_rows {
            kernel.set(i, i, 1.0 + self.lambda);
            for j in (i + 1)..n_rows {
                let k = (-self.gamma * Self::squared_distance(&scaled, i, &scaled, j, n_cols)).exp();
                kernel.set(i, j, k);
                kernel.set(j, i, k);
            }
        }

        let values = y.as_slice();
        self.y_mean = values.iter().sum::<f32>() / n_rows as f32;
        let centered = Vector::from_vec(values.iter().map(|&v| v - self.y_mean).collect());

        let alpha = kernel
            .cholesky_solve(&centered)
            .map_err(|e| RuidoError::fit(family, e))?;
        self.alpha = alpha.as_slice().to_vec();
        self.x_train = Some(scaled);
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

        let n_train = train.shape().0;
        let mut preds = Vec::with_capacity(n_rows);
        for row in 0..n_rows {
            let mut acc = self.y_mean;
            for (i, &a) in self.alpha.iter().enumerate().take(n_train) {
                let k = (-self.gamma * Self::squared_distance(&scaled, row, train, i, n_cols)).exp();
                acc += a * k;
            }
            preds.push(acc);
        }
        Vector::from_vec(preds)
    }
}

/// Random search over (gamma, lambda), 10-fold CV.
///
/// Gamma is sampled around the 1/n_features heuristic that holds for
/// standardized inputs; lambda spans weak to strong regularization.
pub fn tune(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    budget: &TuningBudget,
    seed: u64,
) -> Result<SvmRadialModel> {
    let n_features = x.shape().1 as f64;
    let mut rng = StdRng::seed_from_u64(seed);
    let candidates: Vec<(f32, f32)> = (0..budget.random_candidates)
        .map(|_| {
            (
                log_uniform(&mut rng, 0.1 / n_features, 10.0 / n_features) as f32,
                log_uniform(&mut rng, 1e-3, 10.0) as f32,
            )
        })
        .collect();

    let folds = budget.folds_for(x.shape().0);
    let ((gamma, lambda), cv) = select_best(ModelFamily::Svm, candidates, |&(g, l)| {
        cross_val_rmse(x, y, folds, seed, |train_x, train_y, val_x| {
            let mut model = SvmRadialModel::new(g, l);
            model.fit(train_x, train_y)?;
            Ok(model.predict(val_x))
        })
    })?;
    tracing::debug!(gamma, lambda, cv, "svm tuned");

    let mut model = SvmRadialModel::new(gamma, lambda);
    model.fit(x, y)?;
    Ok(model)
}
