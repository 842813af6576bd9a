//! Linear families: ordinary least squares and the elastic net.
//!
//! Both receive two engineered interaction columns (`x5:x6`, `x7:x8:x9`) on
//! top of the raw design, reflecting an analyst who would notice those
//! interactions by inspection. The elastic net runs on standardized
//! features and reports its nonzero coefficients as the selected set.

use aprender::linear_model::{ElasticNet, LinearRegression};
use aprender::preprocessing::StandardScaler;
use aprender::primitives::{Matrix, Vector};
use aprender::traits::{Estimator, Transformer};

use super::{ModelFamily, Regressor};
use crate::error::{Result, RuidoError};
use crate::tuning::{cross_val_rmse, select_best, TuningBudget};

/// Names of the engineered interaction columns, in append order.
pub const INTERACTION_NAMES: [&str; 2] = ["x5:x6", "x7:x8:x9"];

// Coefficients below this magnitude count as zeroed by the L1 penalty.
const NONZERO_TOL: f32 = 1e-6;

/// Appends the `x5*x6` and `x7*x8*x9` interaction columns.
pub fn augment_with_interactions(x: &Matrix<f32>, names: &[String]) -> (Matrix<f32>, Vec<String>) {
    let (n_rows, n_cols) = x.shape();
    let mut data = Vec::with_capacity(n_rows * (n_cols + 2));
    for row in 0..n_rows {
        for col in 0..n_cols {
            data.push(x.get(row, col));
        }
        data.push(x.get(row, 4) * x.get(row, 5));
        data.push(x.get(row, 6) * x.get(row, 7) * x.get(row, 8));
    }
    let augmented = Matrix::from_vec(n_rows, n_cols + 2, data)
        .expect("augmented design dimensions are consistent");

    let mut augmented_names = names.to_vec();
    augmented_names.extend(INTERACTION_NAMES.iter().map(|s| (*s).to_string()));
    (augmented, augmented_names)
}

/// Ordinary least squares over the engineered design.
pub struct LinearModel {
    inner: LinearRegression,
}

impl LinearModel {
    pub fn new() -> Self {
        Self {
            inner: LinearRegression::new(),
        }
    }
}

impl Default for LinearModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Regressor for LinearModel {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        self.inner
            .fit(x, y)
            .map_err(|e| RuidoError::fit(ModelFamily::Linear.name(), e))
    }

    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        self.inner.predict(x)
    }

    fn selected(&self, names: &[String]) -> Option<Vec<String>> {
        // A plain least-squares fit retains every column it is given.
        Some(names.to_vec())
    }
}

/// Elastic net over the standardized engineered design.
pub struct GlmnetModel {
    alpha: f32,
    l1_ratio: f32,
    scaler: StandardScaler,
    inner: ElasticNet,
}

impl GlmnetModel {
    pub fn new(alpha: f32, l1_ratio: f32) -> Self {
        Self {
            alpha,
            l1_ratio,
            scaler: StandardScaler::new().with_mean(true).with_std(true),
            inner: ElasticNet::new(alpha, l1_ratio),
        }
    }
}

impl Regressor for GlmnetModel {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let family = ModelFamily::Glmnet.name();
        let scaled = self
            .scaler
            .fit_transform(x)
            .map_err(|e| RuidoError::fit(family, e))?;
        self.inner = ElasticNet::new(self.alpha, self.l1_ratio).with_max_iter(2000);
        self.inner
            .fit(&scaled, y)
            .map_err(|e| RuidoError::fit(family, e))
    }

    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        match self.scaler.transform(x) {
            Ok(scaled) => self.inner.predict(&scaled),
            // Scaler state is established during fit; an unfitted model
            // predicts nothing useful either way.
            Err(_) => Vector::from_vec(vec![0.0; x.shape().0]),
        }
    }

    fn selected(&self, names: &[String]) -> Option<Vec<String>> {
        let coefs = self.inner.coefficients();
        Some(
            names
                .iter()
                .zip(coefs.as_slice())
                .filter(|(_, &c)| c.abs() > NONZERO_TOL)
                .map(|(name, _)| name.clone())
                .collect(),
        )
    }
}

/// Fits ordinary least squares; no hyperparameters to tune.
pub fn fit_linear(x: &Matrix<f32>, y: &Vector<f32>) -> Result<LinearModel> {
    let mut model = LinearModel::new();
    model.fit(x, y)?;
    Ok(model)
}

/// Exhaustive grid over (penalty strength, L1 mixing), 10-fold CV.
pub fn tune_glmnet(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    budget: &TuningBudget,
    seed: u64,
) -> Result<GlmnetModel> {
    let alphas = [0.001f32, 0.01, 0.1, 1.0, 10.0, 100.0];
    let l1_ratios = [0.25f32, 0.5, 0.75, 1.0];
    let mut candidates = Vec::with_capacity(alphas.len() * l1_ratios.len());
    for &alpha in &alphas {
        for &l1_ratio in &l1_ratios {
            candidates.push((alpha, l1_ratio));
        }
    }

    let folds = budget.folds_for(x.shape().0);
    let ((alpha, l1_ratio), cv) = select_best(ModelFamily::Glmnet, candidates, |&(a, r)| {
        cross_val_rmse(x, y, folds, seed, |train_x, train_y, val_x| {
            let mut model = GlmnetModel::new(a, r);
            model.fit(train_x, train_y)?;
            Ok(model.predict(val_x))
        })
    })?;
    tracing::debug!(alpha, l1_ratio, cv, "glmnet tuned");

    let mut model = GlmnetModel::new(alpha, l1_ratio);
    model.fit(x, y)?;
    Ok(model)
}
