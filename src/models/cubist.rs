//! Cubist-style committees of rule-local linear models.
//!
//! Each committee member is a shallow variance-reduction tree whose leaves
//! hold an L1-regularized linear model (`aprender::linear_model::Lasso`)
//! fitted on the leaf's rows; later members fit residual-adjusted targets
//! and predictions average across the committee. The original Cubist's
//! instance-based neighbor correction is omitted.

use aprender::linear_model::Lasso;
use aprender::primitives::{Matrix, Vector};
use aprender::traits::Estimator;

use super::{ModelFamily, Regressor};
use crate::error::{Result, RuidoError};
use crate::tuning::{cross_val_rmse, select_best, take_rows, TuningBudget};

const MAX_DEPTH: usize = 2;
const MIN_LEAF: usize = 25;
const LEAF_ALPHA: f32 = 0.1;
const N_THRESHOLDS: usize = 8;
const NONZERO_TOL: f32 = 1e-6;

enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        model: Option<Lasso>,
        mean: f32,
    },
}

impl Node {
    fn predict_one(&self, row: &[f32]) -> f32 {
        match self {
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict_one(row)
                } else {
                    right.predict_one(row)
                }
            }
            Node::Leaf { model, mean } => match model {
                Some(lasso) => {
                    let x = Matrix::from_vec(1, row.len(), row.to_vec())
                        .expect("single-row matrix");
                    lasso.predict(&x).as_slice()[0]
                }
                None => *mean,
            },
        }
    }

    fn collect_features(&self, features: &mut Vec<usize>) {
        match self {
            Node::Split {
                feature,
                left,
                right,
                ..
            } => {
                features.push(*feature);
                left.collect_features(features);
                right.collect_features(features);
            }
            Node::Leaf { model, .. } => {
                if let Some(lasso) = model {
                    for (i, &c) in lasso.coefficients().as_slice().iter().enumerate() {
                        if c.abs() > NONZERO_TOL {
                            features.push(i);
                        }
                    }
                }
            }
        }
    }
}

pub struct CubistModel {
    committees: usize,
    members: Vec<Node>,
}

impl CubistModel {
    pub fn new(committees: usize) -> Self {
        Self {
            committees: committees.max(1),
            members: Vec::new(),
        }
    }

    /// Best (feature, threshold) by sum-of-squares reduction; thresholds are
    /// sampled at interior quantiles within the node.
    fn best_split(x: &Matrix<f32>, targets: &[f32], rows: &[usize]) -> Option<(usize, f32, f32)> {
        let n_cols = x.shape().1;
        let node_sum: f32 = rows.iter().map(|&r| targets[r]).sum();
        let node_sq: f32 = rows.iter().map(|&r| targets[r] * targets[r]).sum();
        let node_sse = node_sq - node_sum * node_sum / rows.len() as f32;

        let mut best: Option<(usize, f32, f32)> = None;
        for feature in 0..n_cols {
            let mut values: Vec<f32> = rows.iter().map(|&r| x.get(r, feature)).collect();
            values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            for i in 1..=N_THRESHOLDS {
                let q = i as f64 / (N_THRESHOLDS + 1) as f64;
                let threshold = values[((values.len() - 1) as f64 * q).round() as usize];

                let mut left_sum = 0.0f32;
                let mut left_sq = 0.0f32;
                let mut left_n = 0usize;
                for &r in rows {
                    if x.get(r, feature) <= threshold {
                        let t = targets[r];
                        left_sum += t;
                        left_sq += t * t;
                        left_n += 1;
                    }
                }
                let right_n = rows.len() - left_n;
                if left_n < MIN_LEAF || right_n < MIN_LEAF {
                    continue;
                }

                let right_sum = node_sum - left_sum;
                let right_sq = node_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / left_n as f32)
                    + (right_sq - right_sum * right_sum / right_n as f32);
                let gain = node_sse - sse;
                if gain > 0.0 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, threshold, gain));
                }
            }
        }
        best
    }

    fn fit_leaf(x: &Matrix<f32>, targets: &[f32], rows: &[usize]) -> Node {
        let mean = rows.iter().map(|&r| targets[r]).sum::<f32>() / rows.len() as f32;
        let leaf_x = take_rows(x, rows);
        let leaf_y = Vector::from_vec(rows.iter().map(|&r| targets[r]).collect());

        let mut lasso = Lasso::new(LEAF_ALPHA).with_max_iter(500);
        match lasso.fit(&leaf_x, &leaf_y) {
            Ok(()) => Node::Leaf {
                model: Some(lasso),
                mean,
            },
            // A degenerate leaf falls back to its mean.
            Err(_) => Node::Leaf { model: None, mean },
        }
    }

    fn build(x: &Matrix<f32>, targets: &[f32], rows: Vec<usize>, depth: usize) -> Node {
        if depth >= MAX_DEPTH || rows.len() < 2 * MIN_LEAF {
            return Self::fit_leaf(x, targets, &rows);
        }
        let Some((feature, threshold, _)) = Self::best_split(x, targets, &rows) else {
            return Self::fit_leaf(x, targets, &rows);
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| x.get(r, feature) <= threshold);
        Node::Split {
            feature,
            threshold,
            left: Box::new(Self::build(x, targets, left_rows, depth + 1)),
            right: Box::new(Self::build(x, targets, right_rows, depth + 1)),
        }
    }

    fn predict_rows(&self, x: &Matrix<f32>) -> Vec<f32> {
        let (n_rows, n_cols) = x.shape();
        let data = x.as_slice();
        (0..n_rows)
            .map(|row| {
                let sample = &data[row * n_cols..(row + 1) * n_cols];
                let sum: f32 = self.members.iter().map(|m| m.predict_one(sample)).sum();
                sum / self.members.len().max(1) as f32
            })
            .collect()
    }
}

impl Regressor for CubistModel {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let n_rows = x.shape().0;
        if n_rows < 2 * MIN_LEAF {
            return Err(RuidoError::fit(
                ModelFamily::Cubist.name(),
                format!("need at least {} samples", 2 * MIN_LEAF),
            ));
        }

        let truth = y.as_slice();
        self.members = Vec::with_capacity(self.committees);
        let mut targets: Vec<f32> = truth.to_vec();

        for _ in 0..self.committees {
            let member = Self::build(x, &targets, (0..n_rows).collect(), 0);

            // Residual-adjusted targets for the next member: overshoot is
            // pulled back, undershoot pushed forward.
            let data = x.as_slice();
            let n_cols = x.shape().1;
            targets = (0..n_rows)
                .map(|row| {
                    let sample = &data[row * n_cols..(row + 1) * n_cols];
                    2.0 * truth[row] - member.predict_one(sample)
                })
                .collect();

            self.members.push(member);
        }
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        Vector::from_vec(self.predict_rows(x))
    }

    fn selected(&self, names: &[String]) -> Option<Vec<String>> {
        let mut features = Vec::new();
        for member in &self.members {
            member.collect_features(&mut features);
        }
        features.sort_unstable();
        features.dedup();
        Some(features.into_iter().map(|f| names[f].clone()).collect())
    }
}

/// Exhaustive grid over the committee count, 10-fold CV.
pub fn tune(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    budget: &TuningBudget,
    seed: u64,
) -> Result<CubistModel> {
    let candidates = vec![1usize, 5];

    let folds = budget.folds_for(x.shape().0);
    let (committees, cv) = select_best(ModelFamily::Cubist, candidates, |&c| {
        cross_val_rmse(x, y, folds, seed, |train_x, train_y, val_x| {
            let mut model = CubistModel::new(c);
            model.fit(train_x, train_y)?;
            Ok(model.predict(val_x))
        })
    })?;
    tracing::debug!(committees, cv, "cubist tuned");

    let mut model = CubistModel::new(committees);
    model.fit(x, y)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piecewise_linear_data() -> (Matrix<f32>, Vector<f32>) {
        // Slope 1 below 0.5, slope 4 above: a split plus leaf models nails it.
        let n = 120;
        let xs: Vec<f32> = (0..n).map(|i| i as f32 / (n - 1) as f32).collect();
        let ys: Vec<f32> = xs
            .iter()
            .map(|&v| if v < 0.5 { v } else { 0.5 + 4.0 * (v - 0.5) })
            .collect();
        (
            Matrix::from_vec(n, 1, xs).expect("matrix"),
            Vector::from_vec(ys),
        )
    }

    #[test]
    fn test_fits_piecewise_linear_target() {
        let (x, y) = piecewise_linear_data();
        let mut model = CubistModel::new(1);
        model.fit(&x, &y).expect("fit");
        let pred = model.predict(&x);
        let err = aprender::metrics::rmse(&pred, &y);
        assert!(err < 0.25, "rmse = {err}");
    }

    #[test]
    fn test_selected_includes_split_variable() {
        let (x, y) = piecewise_linear_data();
        let mut model = CubistModel::new(1);
        model.fit(&x, &y).expect("fit");
        let names = vec!["x1".to_string()];
        let selected = model.selected(&names).expect("cubist reports selection");
        assert_eq!(selected, vec!["x1".to_string()]);
    }

    #[test]
    fn test_committees_do_not_degrade_fit() {
        let (x, y) = piecewise_linear_data();
        let rmse_for = |committees| {
            let mut model = CubistModel::new(committees);
            model.fit(&x, &y).expect("fit");
            aprender::metrics::rmse(&model.predict(&x), &y)
        };
        let single = rmse_for(1);
        let committee = rmse_for(5);
        assert!(committee <= single * 1.5);
    }

    #[test]
    fn test_rejects_tiny_sample() {
        let x = Matrix::from_vec(10, 1, (0..10).map(|i| i as f32).collect()).expect("matrix");
        let y = Vector::from_vec((0..10).map(|i| i as f32).collect());
        let mut model = CubistModel::new(1);
        assert!(model.fit(&x, &y).is_err());
    }
}
