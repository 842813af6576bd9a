//! Single-hidden-layer neural network regression (the nnet analog).
//!
//! Sigmoid hidden units, linear output, L2 weight decay, full-batch
//! gradient descent with momentum on standardized inputs and a
//! standardized response. Weights are initialized with Box-Muller draws
//! scaled by fan-in, seeded explicitly for reproducibility.

use aprender::preprocessing::StandardScaler;
use aprender::primitives::{Matrix, Vector};
use aprender::traits::Transformer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use super::{ModelFamily, Regressor};
use crate::error::{Result, RuidoError};
use crate::tuning::{cross_val_rmse, log_uniform, select_best, TuningBudget};

const MOMENTUM: f32 = 0.9;
const EPOCHS: usize = 200;

pub struct MlpRegressor {
    n_hidden: usize,
    decay: f32,
    learning_rate: f32,
    seed: u64,
    scaler: StandardScaler,
    n_inputs: usize,
    w1: Vec<f32>,
    b1: Vec<f32>,
    w2: Vec<f32>,
    b2: f32,
    y_mean: f32,
    y_sd: f32,
}

impl MlpRegressor {
    pub fn new(n_hidden: usize, decay: f32, learning_rate: f32, seed: u64) -> Self {
        Self {
            n_hidden: n_hidden.max(1),
            decay,
            learning_rate,
            seed,
            scaler: StandardScaler::new().with_mean(true).with_std(true),
            n_inputs: 0,
            w1: Vec::new(),
            b1: Vec::new(),
            w2: Vec::new(),
            b2: 0.0,
            y_mean: 0.0,
            y_sd: 1.0,
        }
    }

    fn randn(rng: &mut StdRng) -> f32 {
        let u1: f64 = rng.gen::<f64>().max(1e-10);
        let u2: f64 = rng.gen();
        ((-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()) as f32
    }

    fn sigmoid(z: f32) -> f32 {
        1.0 / (1.0 + (-z).exp())
    }

    /// Hidden activations for one standardized row.
    fn hidden(&self, row: &[f32]) -> Vec<f32> {
        (0..self.n_hidden)
            .map(|j| {
                let mut z = self.b1[j];
                let weights = &self.w1[j * self.n_inputs..(j + 1) * self.n_inputs];
                for (w, &v) in weights.iter().zip(row) {
                    z += w * v;
                }
                Self::sigmoid(z)
            })
            .collect()
    }

    fn output(&self, hidden: &[f32]) -> f32 {
        let mut out = self.b2;
        for (w, &h) in self.w2.iter().zip(hidden) {
            out += w * h;
        }
        out
    }
}

impl Regressor for MlpRegressor {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let family = ModelFamily::Nnet.name();
        let (n_rows, n_cols) = x.shape();
        if n_rows < 2 {
            return Err(RuidoError::fit(family, "need at least two samples"));
        }

        let scaled = self
            .scaler
            .fit_transform(x)
            .map_err(|e| RuidoError::fit(family, e))?;
        let data = scaled.as_slice();

        let values = y.as_slice();
        self.y_mean = values.iter().sum::<f32>() / n_rows as f32;
        let var = values
            .iter()
            .map(|&v| (v - self.y_mean) * (v - self.y_mean))
            .sum::<f32>()
            / n_rows as f32;
        self.y_sd = var.sqrt().max(1e-6);
        let targets: Vec<f32> = values.iter().map(|&v| (v - self.y_mean) / self.y_sd).collect();

        self.n_inputs = n_cols;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let w1_scale = 1.0 / (n_cols as f32).sqrt();
        let w2_scale = 1.0 / (self.n_hidden as f32).sqrt();
        self.w1 = (0..self.n_hidden * n_cols)
            .map(|_| w1_scale * Self::randn(&mut rng))
            .collect();
        self.b1 = vec![0.0; self.n_hidden];
        self.w2 = (0..self.n_hidden)
            .map(|_| w2_scale * Self::randn(&mut rng))
            .collect();
        self.b2 = 0.0;

        let mut v_w1 = vec![0.0f32; self.w1.len()];
        let mut v_b1 = vec![0.0f32; self.n_hidden];
        let mut v_w2 = vec![0.0f32; self.n_hidden];
        let mut v_b2 = 0.0f32;

        let inv_n = 1.0 / n_rows as f32;
        for _ in 0..EPOCHS {
            let mut g_w1 = vec![0.0f32; self.w1.len()];
            let mut g_b1 = vec![0.0f32; self.n_hidden];
            let mut g_w2 = vec![0.0f32; self.n_hidden];
            let mut g_b2 = 0.0f32;

            for (row, &target) in targets.iter().enumerate() {
                let sample = &data[row * n_cols..(row + 1) * n_cols];
                let hidden = self.hidden(sample);
                let err = self.output(&hidden) - target;

                g_b2 += err * inv_n;
                for j in 0..self.n_hidden {
                    let h = hidden[j];
                    g_w2[j] += err * h * inv_n;
                    let d_pre = err * self.w2[j] * h * (1.0 - h) * inv_n;
                    g_b1[j] += d_pre;
                    let offset = j * n_cols;
                    for (c, &v) in sample.iter().enumerate() {
                        g_w1[offset + c] += d_pre * v;
                    }
                }
            }

            // L2 decay on weights, not biases.
            for (g, &w) in g_w1.iter_mut().zip(&self.w1) {
                *g += self.decay * w;
            }
            for (g, &w) in g_w2.iter_mut().zip(&self.w2) {
                *g += self.decay * w;
            }

            for ((w, v), g) in self.w1.iter_mut().zip(v_w1.iter_mut()).zip(&g_w1) {
                *v = MOMENTUM * *v - self.learning_rate * g;
                *w += *v;
            }
            for ((b, v), g) in self.b1.iter_mut().zip(v_b1.iter_mut()).zip(&g_b1) {
                *v = MOMENTUM * *v - self.learning_rate * g;
                *b += *v;
            }
            for ((w, v), g) in self.w2.iter_mut().zip(v_w2.iter_mut()).zip(&g_w2) {
                *v = MOMENTUM * *v - self.learning_rate * g;
                *w += *v;
            }
            v_b2 = MOMENTUM * v_b2 - self.learning_rate * g_b2;
            self.b2 += v_b2;
        }
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        let (n_rows, n_cols) = x.shape();
        if self.w1.is_empty() {
            return Vector::from_vec(vec![self.y_mean; n_rows]);
        }
        let scaled = match self.scaler.transform(x) {
            Ok(scaled) => scaled,
            Err(_) => return Vector::from_vec(vec![self.y_mean; n_rows]),
        };
        let data = scaled.as_slice();

        let mut preds = Vec::with_capacity(n_rows);
        for row in 0..n_rows {
            let sample = &data[row * n_cols..(row + 1) * n_cols];
            let hidden = self.hidden(sample);
            preds.push(self.output(&hidden) * self.y_sd + self.y_mean);
        }
        Vector::from_vec(preds)
    }
}

/// Random search over (hidden units, decay, learning rate), 10-fold CV.
pub fn tune(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    budget: &TuningBudget,
    seed: u64,
) -> Result<MlpRegressor> {
    let mut rng = StdRng::seed_from_u64(seed);
    let candidates: Vec<(usize, f32, f32)> = (0..budget.random_candidates)
        .map(|_| {
            (
                rng.gen_range(2..=15),
                log_uniform(&mut rng, 1e-4, 1e-1) as f32,
                log_uniform(&mut rng, 1e-3, 1e-1) as f32,
            )
        })
        .collect();

    let folds = budget.folds_for(x.shape().0);
    let ((n_hidden, decay, lr), cv) = select_best(ModelFamily::Nnet, candidates, |&(h, d, l)| {
        cross_val_rmse(x, y, folds, seed, |train_x, train_y, val_x| {
            let mut model = MlpRegressor::new(h, d, l, seed);
            model.fit(train_x, train_y)?;
            Ok(model.predict(val_x))
        })
    })?;
    tracing::debug!(n_hidden, decay, lr, cv, "nnet tuned");

    let mut model = MlpRegressor::new(n_hidden, decay, lr, seed);
    model.fit(x, y)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learns_linear_trend() {
        let n = 40;
        let xs: Vec<f32> = (0..n).map(|i| i as f32 / n as f32).collect();
        let ys: Vec<f32> = xs.iter().map(|&v| 2.0 * v - 1.0).collect();
        let x = Matrix::from_vec(n, 1, xs).expect("matrix");
        let y = Vector::from_vec(ys);

        let mut model = MlpRegressor::new(4, 1e-4, 0.05, 1);
        model.fit(&x, &y).expect("fit");
        let pred = model.predict(&x);
        let err = aprender::metrics::rmse(&pred, &y);
        assert!(err < 0.3, "rmse = {err}");
    }

    #[test]
    fn test_fit_is_seed_deterministic() {
        let x = Matrix::from_vec(10, 1, (0..10).map(|i| i as f32).collect()).expect("matrix");
        let y = Vector::from_vec((0..10).map(|i| i as f32).collect());
        let run = |seed| {
            let mut model = MlpRegressor::new(3, 1e-3, 0.01, seed);
            model.fit(&x, &y).expect("fit");
            model.predict(&x).as_slice().to_vec()
        };
        assert_eq!(run(5), run(5));
        assert_ne!(run(5), run(6));
    }

    #[test]
    fn test_unfitted_network_predicts_zeroish() {
        let model = MlpRegressor::new(3, 1e-3, 0.01, 1);
        let x = Matrix::from_vec(2, 1, vec![1.0, 2.0]).expect("matrix");
        assert_eq!(model.predict(&x).as_slice(), &[0.0, 0.0]);
    }
}
