//! Multivariate adaptive regression splines.
//!
//! Forward pass: greedily add mirrored hinge pairs max(0, x - t) and
//! max(0, t - x) at candidate knots (interior quantiles of each column),
//! screening candidates by the residual sum-of-squares reduction of a tiny
//! projection solve, then refitting the whole basis with
//! `LinearRegression`. Backward pass: remove basis functions while the
//! generalized cross-validation score improves. Degree-2 terms multiply a
//! hinge into an existing degree-1 basis function.

use aprender::linear_model::LinearRegression;
use aprender::primitives::{Matrix, Vector};
use aprender::traits::Estimator;

use super::{ModelFamily, Regressor};
use crate::error::{Result, RuidoError};
use crate::tuning::{cross_val_rmse, select_best, TuningBudget};

const N_KNOTS: usize = 5;
const MIN_RSS_GAIN: f32 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
struct Hinge {
    feature: usize,
    knot: f32,
    positive: bool,
}

impl Hinge {
    fn eval(&self, row: &[f32]) -> f32 {
        let delta = row[self.feature] - self.knot;
        let signed = if self.positive { delta } else { -delta };
        signed.max(0.0)
    }
}

/// Product of one or two hinges.
#[derive(Debug, Clone, PartialEq)]
struct BasisFunction {
    hinges: Vec<Hinge>,
}

impl BasisFunction {
    fn degree(&self) -> usize {
        self.hinges.len()
    }

    fn eval(&self, row: &[f32]) -> f32 {
        self.hinges.iter().map(|h| h.eval(row)).product()
    }

    fn uses_feature(&self, feature: usize) -> bool {
        self.hinges.iter().any(|h| h.feature == feature)
    }

    fn child(&self, hinge: Hinge) -> BasisFunction {
        let mut hinges = self.hinges.clone();
        hinges.push(hinge);
        BasisFunction { hinges }
    }
}

pub struct MarsModel {
    max_terms: usize,
    degree: usize,
    basis: Vec<BasisFunction>,
    coefficients: Vec<f32>,
    intercept: f32,
}

impl MarsModel {
    pub fn new(max_terms: usize, degree: usize) -> Self {
        Self {
            max_terms: max_terms.max(3),
            degree: degree.clamp(1, 2),
            basis: Vec::new(),
            coefficients: Vec::new(),
            intercept: 0.0,
        }
    }

    /// Interior quantile knots of one column, deduplicated.
    fn quantile_knots(column: &[f32]) -> Vec<f32> {
        let mut sorted = column.to_vec();
        sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = sorted.len();
        let mut knots = Vec::with_capacity(N_KNOTS);
        for i in 1..=N_KNOTS {
            let q = i as f64 / (N_KNOTS + 1) as f64;
            let value = sorted[((n - 1) as f64 * q).round() as usize];
            if knots.last() != Some(&value) {
                knots.push(value);
            }
        }
        knots
    }

    /// RSS reduction from projecting the residual onto span{1, b1, b2}.
    ///
    /// Solves the 3x3 Gram system with a tiny ridge; a non-positive-definite
    /// system (collinear candidate) scores zero.
    fn rss_reduction(residual: &[f32], b1: &[f32], b2: &[f32]) -> f32 {
        let n = residual.len() as f32;
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        let ones_b1: f32 = b1.iter().sum();
        let ones_b2: f32 = b2.iter().sum();
        let ridge = 1e-6 * n;

        let gram = Matrix::from_vec(
            3,
            3,
            vec![
                n + ridge,
                ones_b1,
                ones_b2,
                ones_b1,
                dot(b1, b1) + ridge,
                dot(b1, b2),
                ones_b2,
                dot(b1, b2),
                dot(b2, b2) + ridge,
            ],
        )
        .expect("3x3 gram matrix");
        let rhs = Vector::from_vec(vec![
            residual.iter().sum(),
            dot(b1, residual),
            dot(b2, residual),
        ]);

        match gram.cholesky_solve(&rhs) {
            Ok(beta) => beta
                .as_slice()
                .iter()
                .zip(rhs.as_slice())
                .map(|(b, g)| b * g)
                .sum::<f32>()
                .max(0.0),
            Err(_) => 0.0,
        }
    }

    /// Basis design matrix for the current term set.
    fn basis_matrix(&self, x: &Matrix<f32>, basis: &[BasisFunction]) -> Matrix<f32> {
        let (n_rows, n_cols) = x.shape();
        let data = x.as_slice();
        let mut out = Vec::with_capacity(n_rows * basis.len());
        for row in 0..n_rows {
            let sample = &data[row * n_cols..(row + 1) * n_cols];
            for b in basis {
                out.push(b.eval(sample));
            }
        }
        Matrix::from_vec(n_rows, basis.len(), out).expect("basis matrix dimensions are consistent")
    }

    /// Least-squares refit of a basis set; returns (intercept, coefs, rss).
    fn refit(
        &self,
        x: &Matrix<f32>,
        y: &Vector<f32>,
        basis: &[BasisFunction],
    ) -> Result<(f32, Vec<f32>, f32)> {
        let family = ModelFamily::Mars.name();
        let truth = y.as_slice();
        if basis.is_empty() {
            let mean = truth.iter().sum::<f32>() / truth.len() as f32;
            let rss = truth.iter().map(|&t| (t - mean) * (t - mean)).sum();
            return Ok((mean, Vec::new(), rss));
        }

        let design = self.basis_matrix(x, basis);
        let mut lstsq = LinearRegression::new();
        lstsq
            .fit(&design, y)
            .map_err(|e| RuidoError::fit(family, e))?;
        let pred = lstsq.predict(&design);
        let rss = truth
            .iter()
            .zip(pred.as_slice())
            .map(|(&t, &p)| (t - p) * (t - p))
            .sum();
        Ok((lstsq.intercept(), lstsq.coefficients().as_slice().to_vec(), rss))
    }

    /// Generalized cross-validation score; lower is better.
    fn gcv(&self, rss: f32, n_rows: usize, n_terms: usize) -> f32 {
        let penalty = if self.degree > 1 { 3.0 } else { 2.0 };
        let effective = 1.0 + n_terms as f32 + penalty * n_terms as f32 / 2.0;
        let denom = 1.0 - effective / n_rows as f32;
        if denom <= 0.0 {
            f32::INFINITY
        } else {
            (rss / n_rows as f32) / (denom * denom)
        }
    }
}

impl Regressor for MarsModel {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let (n_rows, n_cols) = x.shape();
        if n_rows < 8 {
            return Err(RuidoError::fit(
                ModelFamily::Mars.name(),
                "too few samples for knot placement",
            ));
        }
        let data = x.as_slice();
        let truth = y.as_slice();

        let knots_per_feature: Vec<Vec<f32>> = (0..n_cols)
            .map(|col| {
                let column: Vec<f32> = (0..n_rows).map(|row| data[row * n_cols + col]).collect();
                Self::quantile_knots(&column)
            })
            .collect();

        // Forward pass.
        let mut basis: Vec<BasisFunction> = Vec::new();
        let (mut intercept, mut coefs, mut rss) = self.refit(x, y, &basis)?;
        let mut residual: Vec<f32> = truth.iter().map(|&t| t - intercept).collect();

        while basis.len() + 2 <= self.max_terms {
            // Parents: the intercept, plus degree-1 terms when interactions
            // are allowed.
            let intercept_parent = BasisFunction { hinges: Vec::new() };
            let mut parents: Vec<&BasisFunction> = vec![&intercept_parent];
            if self.degree > 1 {
                parents.extend(basis.iter().filter(|b| b.degree() == 1));
            }

            let mut best: Option<(f32, BasisFunction, BasisFunction)> = None;
            for parent in parents {
                let parent_values: Vec<f32> = (0..n_rows)
                    .map(|row| {
                        let sample = &data[row * n_cols..(row + 1) * n_cols];
                        if parent.hinges.is_empty() {
                            1.0
                        } else {
                            parent.eval(sample)
                        }
                    })
                    .collect();

                for (feature, knots) in knots_per_feature.iter().enumerate() {
                    if parent.uses_feature(feature) {
                        continue;
                    }
                    for &knot in knots {
                        let up = Hinge {
                            feature,
                            knot,
                            positive: true,
                        };
                        let down = Hinge {
                            feature,
                            knot,
                            positive: false,
                        };
                        let b1: Vec<f32> = (0..n_rows)
                            .map(|row| {
                                parent_values[row]
                                    * up.eval(&data[row * n_cols..(row + 1) * n_cols])
                            })
                            .collect();
                        let b2: Vec<f32> = (0..n_rows)
                            .map(|row| {
                                parent_values[row]
                                    * down.eval(&data[row * n_cols..(row + 1) * n_cols])
                            })
                            .collect();

                        let gain = Self::rss_reduction(&residual, &b1, &b2);
                        if best.as_ref().map_or(gain > MIN_RSS_GAIN, |(g, _, _)| gain > *g) {
                            best = Some((gain, parent.child(up.clone()), parent.child(down)));
                        }
                    }
                }
            }

            let Some((_, term_up, term_down)) = best else {
                break;
            };
            basis.push(term_up);
            basis.push(term_down);

            // A second mirrored pair on a feature is collinear with the
            // first pair plus the intercept (the pair differences are both
            // affine in x). Retry with the upward hinge alone; if even that
            // is dependent, the span is closed and the forward pass stops.
            let refit = match self.refit(x, y, &basis) {
                Ok(refit) => refit,
                Err(_) => {
                    basis.pop();
                    match self.refit(x, y, &basis) {
                        Ok(refit) => refit,
                        Err(_) => {
                            basis.pop();
                            break;
                        }
                    }
                }
            };
            intercept = refit.0;
            coefs = refit.1;
            rss = refit.2;
            residual = (0..n_rows)
                .map(|row| {
                    let sample = &data[row * n_cols..(row + 1) * n_cols];
                    let pred = intercept
                        + basis
                            .iter()
                            .zip(&coefs)
                            .map(|(b, c)| c * b.eval(sample))
                            .sum::<f32>();
                    truth[row] - pred
                })
                .collect();
        }

        // Backward pass: drop terms while GCV improves.
        let mut gcv_now = self.gcv(rss, n_rows, basis.len());
        loop {
            let mut best_removal: Option<(usize, f32, (f32, Vec<f32>, f32))> = None;
            for i in 0..basis.len() {
                let mut reduced = basis.clone();
                reduced.remove(i);
                let refit = self.refit(x, y, &reduced)?;
                let score = self.gcv(refit.2, n_rows, reduced.len());
                if score < gcv_now
                    && best_removal.as_ref().map_or(true, |(_, s, _)| score < *s)
                {
                    best_removal = Some((i, score, refit));
                }
            }
            let Some((index, score, refit)) = best_removal else {
                break;
            };
            basis.remove(index);
            gcv_now = score;
            intercept = refit.0;
            coefs = refit.1;
        }

        self.basis = basis;
        self.coefficients = coefs;
        self.intercept = intercept;
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        let (n_rows, n_cols) = x.shape();
        let data = x.as_slice();
        let mut preds = Vec::with_capacity(n_rows);
        for row in 0..n_rows {
            let sample = &data[row * n_cols..(row + 1) * n_cols];
            let pred = self.intercept
                + self
                    .basis
                    .iter()
                    .zip(&self.coefficients)
                    .map(|(b, c)| c * b.eval(sample))
                    .sum::<f32>();
            preds.push(pred);
        }
        Vector::from_vec(preds)
    }

    fn selected(&self, names: &[String]) -> Option<Vec<String>> {
        let mut features: Vec<usize> = self
            .basis
            .iter()
            .flat_map(|b| b.hinges.iter().map(|h| h.feature))
            .collect();
        features.sort_unstable();
        features.dedup();
        Some(features.into_iter().map(|f| names[f].clone()).collect())
    }
}

/// Exhaustive grid over (max_terms, degree), 10-fold CV.
pub fn tune(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    budget: &TuningBudget,
    seed: u64,
) -> Result<MarsModel> {
    let n_rows = x.shape().0;
    let candidates: Vec<(usize, usize)> = [(11usize, 1usize), (11, 2), (21, 1), (21, 2)]
        .into_iter()
        .filter(|&(terms, _)| terms * 4 < n_rows.max(16))
        .collect();
    let candidates = if candidates.is_empty() {
        vec![(5, 1)]
    } else {
        candidates
    };

    let folds = budget.folds_for(n_rows);
    let ((max_terms, degree), cv) = select_best(ModelFamily::Mars, candidates, |&(t, d)| {
        cross_val_rmse(x, y, folds, seed, |train_x, train_y, val_x| {
            let mut model = MarsModel::new(t, d);
            model.fit(train_x, train_y)?;
            Ok(model.predict(val_x))
        })
    })?;
    tracing::debug!(max_terms, degree, cv, "mars tuned");

    let mut model = MarsModel::new(max_terms, degree);
    model.fit(x, y)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vee_data() -> (Matrix<f32>, Vector<f32>) {
        // y = |x - 0.5| is exactly one mirrored hinge pair.
        let n = 60;
        let xs: Vec<f32> = (0..n).map(|i| i as f32 / (n - 1) as f32).collect();
        let ys: Vec<f32> = xs.iter().map(|&v| (v - 0.5).abs()).collect();
        (
            Matrix::from_vec(n, 1, xs).expect("matrix"),
            Vector::from_vec(ys),
        )
    }

    #[test]
    fn test_recovers_hinge_shaped_target() {
        let (x, y) = vee_data();
        let mut model = MarsModel::new(7, 1);
        model.fit(&x, &y).expect("fit");
        let pred = model.predict(&x);
        let err = aprender::metrics::rmse(&pred, &y);
        assert!(err < 0.05, "rmse = {err}");
    }

    #[test]
    fn test_selected_reports_basis_variables() {
        let (x, y) = vee_data();
        let mut model = MarsModel::new(7, 1);
        model.fit(&x, &y).expect("fit");
        let names = vec!["x1".to_string()];
        assert_eq!(model.selected(&names), Some(vec!["x1".to_string()]));
    }

    #[test]
    fn test_ignores_pure_noise_column() {
        // Second column is constant-free uniform noise; the forward pass
        // should overwhelmingly prefer the structured first column, and the
        // GCV prune should keep the model small.
        let n = 80;
        let mut data = Vec::with_capacity(n * 2);
        let mut state = 1234u32;
        for i in 0..n {
            let x1 = i as f32 / (n - 1) as f32;
            // Cheap LCG keeps the test free of RNG plumbing.
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = (state >> 8) as f32 / (1u32 << 24) as f32;
            data.push(x1);
            data.push(noise);
        }
        let ys: Vec<f32> = (0..n)
            .map(|i| {
                let x1 = i as f32 / (n - 1) as f32;
                3.0 * (x1 - 0.4).max(0.0)
            })
            .collect();
        let x = Matrix::from_vec(n, 2, data).expect("matrix");
        let y = Vector::from_vec(ys);

        let mut model = MarsModel::new(7, 1);
        model.fit(&x, &y).expect("fit");
        let pred = model.predict(&x);
        assert!(aprender::metrics::rmse(&pred, &y) < 0.1);
    }

    #[test]
    fn test_fits_two_bends_on_one_feature() {
        // A second knot on an already-hinged feature used to make the
        // refit singular and fail the whole fit; the forward pass must
        // recover and model both bends.
        let n = 80;
        let xs: Vec<f32> = (0..n).map(|i| i as f32 / (n - 1) as f32).collect();
        let ys: Vec<f32> = xs
            .iter()
            .map(|&v| (v - 0.3).abs() + (v - 0.7).abs())
            .collect();
        let x = Matrix::from_vec(n, 1, xs).expect("matrix");
        let y = Vector::from_vec(ys);

        let mut model = MarsModel::new(9, 1);
        model.fit(&x, &y).expect("fit");
        let pred = model.predict(&x);
        assert!(aprender::metrics::rmse(&pred, &y) < 0.1);
    }

    #[test]
    fn test_quantile_knots_are_interior_and_sorted() {
        let column: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let knots = MarsModel::quantile_knots(&column);
        assert!(!knots.is_empty());
        assert!(knots.windows(2).all(|w| w[0] < w[1]));
        assert!(knots[0] > 0.0);
        assert!(*knots.last().expect("nonempty") < 99.0);
    }

    #[test]
    fn test_rejects_tiny_sample() {
        let x = Matrix::from_vec(4, 1, vec![0.0, 1.0, 2.0, 3.0]).expect("matrix");
        let y = Vector::from_slice(&[0.0, 1.0, 2.0, 3.0]);
        let mut model = MarsModel::new(7, 1);
        assert!(model.fit(&x, &y).is_err());
    }
}
