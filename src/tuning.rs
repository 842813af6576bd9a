//! Cross-validated hyperparameter search.
//!
//! Families with hyperparameters are tuned by 10-fold CV on the training
//! set: random search (25 candidates by default) for the expensive black-box
//! families, exhaustive grids for the rest. All randomness is seeded from
//! the cell seed and the family index, never from ambient state.

use aprender::model_selection::KFold;
use aprender::primitives::{Matrix, Vector};
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{Result, RuidoError};
use crate::models::ModelFamily;

/// Tuning effort for one cell.
#[derive(Debug, Clone, Copy)]
pub struct TuningBudget {
    pub cv_folds: usize,
    pub random_candidates: usize,
}

impl Default for TuningBudget {
    fn default() -> Self {
        Self {
            cv_folds: 10,
            random_candidates: 25,
        }
    }
}

impl TuningBudget {
    /// Fold count capped so every fold holds at least two rows.
    pub fn folds_for(&self, n_rows: usize) -> usize {
        self.cv_folds.min(n_rows / 2).max(2)
    }
}

/// Deterministic search seed for one (cell, family) pair.
pub fn tuning_seed(cell_seed: u64, family: ModelFamily) -> u64 {
    // SplitMix64-style mixing keeps nearby cell seeds uncorrelated.
    let mut z = cell_seed
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(family.index() as u64);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Copies the selected rows into a new matrix.
pub fn take_rows(x: &Matrix<f32>, indices: &[usize]) -> Matrix<f32> {
    let (_, n_cols) = x.shape();
    let mut data = Vec::with_capacity(indices.len() * n_cols);
    for &row in indices {
        for col in 0..n_cols {
            data.push(x.get(row, col));
        }
    }
    Matrix::from_vec(indices.len(), n_cols, data).expect("row subset dimensions are consistent")
}

/// Copies the selected entries into a new vector.
pub fn take_values(y: &Vector<f32>, indices: &[usize]) -> Vector<f32> {
    let values = y.as_slice();
    Vector::from_vec(indices.iter().map(|&i| values[i]).collect())
}

/// Pooled k-fold CV RMSE of a fit-and-predict closure.
///
/// The closure receives (train_x, train_y, validation_x) and returns
/// validation predictions. Squared errors are pooled over all folds so every
/// training row contributes exactly once.
///
/// # Errors
///
/// Propagates the first fold failure; a candidate that cannot be fitted on
/// some fold is treated as failed by the search drivers.
pub fn cross_val_rmse<F>(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    folds: usize,
    seed: u64,
    mut fit_predict: F,
) -> Result<f32>
where
    F: FnMut(&Matrix<f32>, &Vector<f32>, &Matrix<f32>) -> Result<Vector<f32>>,
{
    let n_rows = x.shape().0;
    let kfold = KFold::new(folds).with_random_state(seed);
    let truth = y.as_slice();

    let mut pooled_sq_err = 0.0f64;
    let mut pooled_n = 0usize;
    for (train_idx, val_idx) in kfold.split(n_rows) {
        let train_x = take_rows(x, &train_idx);
        let train_y = take_values(y, &train_idx);
        let val_x = take_rows(x, &val_idx);

        let pred = fit_predict(&train_x, &train_y, &val_x)?;
        for (&i, &p) in val_idx.iter().zip(pred.as_slice()) {
            let err = f64::from(truth[i]) - f64::from(p);
            pooled_sq_err += err * err;
        }
        pooled_n += val_idx.len();
    }

    Ok(((pooled_sq_err / pooled_n as f64) as f32).sqrt())
}

/// Keeps the candidate with the smallest CV RMSE; candidates whose CV fails
/// are skipped so one degenerate configuration cannot fail the cell.
///
/// # Errors
///
/// Returns a `Fit` error only when every candidate failed.
pub fn select_best<C, F>(
    family: ModelFamily,
    candidates: Vec<C>,
    mut cv_rmse: F,
) -> Result<(C, f32)>
where
    C: Clone + std::fmt::Debug,
    F: FnMut(&C) -> Result<f32>,
{
    let mut best: Option<(C, f32)> = None;
    let mut last_failure: Option<RuidoError> = None;

    for candidate in candidates {
        match cv_rmse(&candidate) {
            Ok(score) if score.is_finite() => {
                let better = best.as_ref().map_or(true, |(_, s)| score < *s);
                if better {
                    best = Some((candidate, score));
                }
            }
            Ok(_) => {
                tracing::debug!(family = %family, ?candidate, "non-finite CV score, skipping");
            }
            Err(err) => {
                tracing::debug!(family = %family, ?candidate, %err, "candidate failed, skipping");
                last_failure = Some(err);
            }
        }
    }

    best.ok_or_else(|| match last_failure {
        Some(err) => RuidoError::fit(family.name(), format!("all candidates failed: {err}")),
        None => RuidoError::fit(family.name(), "no usable tuning candidate"),
    })
}

/// Samples log-uniformly from [lo, hi].
pub fn log_uniform(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
    debug_assert!(lo > 0.0 && hi > lo);
    rng.gen_range(lo.ln()..=hi.ln()).exp()
}
