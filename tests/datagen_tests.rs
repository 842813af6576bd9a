//! Dataset generation integration tests
//!
//! Determinism and the noise-prefix property across realistic study sizes.

use aprender::linear_model::LinearRegression;
use aprender::primitives::Matrix;
use aprender::traits::Estimator;

use ruido::datagen::{self, SplitSpec};

#[test]
fn test_same_seed_same_dataset() {
    let a = datagen::generate(500, 50, 42).expect("generation succeeds");
    let b = datagen::generate(500, 50, 42).expect("generation succeeds");
    assert_eq!(a.x.as_slice(), b.x.as_slice());
    assert_eq!(a.y.as_slice(), b.y.as_slice());
    assert_eq!(a.names, b.names);
}

#[test]
fn test_different_seeds_differ() {
    let a = datagen::generate(500, 0, 1).expect("generation succeeds");
    let b = datagen::generate(500, 0, 2).expect("generation succeeds");
    assert_ne!(a.y.as_slice(), b.y.as_slice());
}

#[test]
fn test_noise_columns_extend_without_perturbing_informative() {
    // Adding more noise columns must leave the informative block and the
    // response bit-identical, and the smaller noise block must be a prefix
    // of the larger one.
    let small = datagen::generate(200, 25, 7).expect("generation succeeds");
    let large = datagen::generate(200, 100, 7).expect("generation succeeds");

    assert_eq!(small.y.as_slice(), large.y.as_slice());
    for row in 0..200 {
        for col in 0..datagen::N_INFORMATIVE + 25 {
            assert_eq!(
                small.x.get(row, col),
                large.x.get(row, col),
                "mismatch at ({row}, {col})"
            );
        }
    }
}

#[test]
fn test_column_naming_convention() {
    let data = datagen::generate(100, 30, 1).expect("generation succeeds");
    assert_eq!(data.names.len(), datagen::N_INFORMATIVE + 30);
    assert_eq!(data.names[0], "x1");
    assert_eq!(data.names[datagen::N_INFORMATIVE - 1], "x20");
    assert_eq!(data.names[datagen::N_INFORMATIVE], "noise1");
    assert_eq!(data.names[datagen::N_INFORMATIVE + 29], "noise30");
    assert!(data.names.iter().skip(datagen::N_INFORMATIVE).all(|n| datagen::is_noise_name(n)));
    assert!(data.names.iter().take(datagen::N_INFORMATIVE).all(|n| !datagen::is_noise_name(n)));
}

#[test]
fn test_split_streams_are_independent() {
    let spec = SplitSpec {
        train_rows: 300,
        test_rows: 300,
        extra_vars: 10,
        seed: 9,
    };
    let (train, test) = datagen::generate_split(&spec).expect("generation succeeds");
    assert_eq!(train.n_rows(), 300);
    assert_eq!(test.n_rows(), 300);
    assert_eq!(train.n_cols(), test.n_cols());
    // Same shape, different draws.
    assert_ne!(train.y.as_slice(), test.y.as_slice());
}

#[test]
fn test_noise_columns_carry_no_signal() {
    // A linear fit on the noise predictors alone should explain essentially
    // none of the response variance; in-sample R^2 of 10 independent
    // regressors on 400 rows sits near 10/399.
    let n_rows = 400;
    let extra_vars = 10;
    let seeds = [1u64, 2, 3, 4, 5];
    let mut r2_sum = 0.0f64;
    for &seed in &seeds {
        let data = datagen::generate(n_rows, extra_vars, seed).expect("generation succeeds");
        let (_, n_cols) = data.x.shape();
        let full = data.x.as_slice();
        let mut noise_only = Vec::with_capacity(n_rows * extra_vars);
        for row in 0..n_rows {
            noise_only.extend_from_slice(
                &full[row * n_cols + datagen::N_INFORMATIVE..(row + 1) * n_cols],
            );
        }
        let x = Matrix::from_vec(n_rows, extra_vars, noise_only).expect("matrix");
        let mut model = LinearRegression::new();
        model.fit(&x, &data.y).expect("noise-only fit");
        let pred = model.predict(&x);

        let y = data.y.as_slice();
        let mean = y.iter().sum::<f32>() / n_rows as f32;
        let ss_tot: f32 = y.iter().map(|&t| (t - mean).powi(2)).sum();
        let ss_res: f32 = y
            .iter()
            .zip(pred.as_slice())
            .map(|(&t, &p)| (t - p).powi(2))
            .sum();
        r2_sum += f64::from(1.0 - ss_res / ss_tot);
    }
    let mean_r2 = r2_sum / seeds.len() as f64;
    assert!(mean_r2.abs() < 0.1, "mean R^2 = {mean_r2}");
}

#[test]
fn test_response_tracks_truth_function() {
    // With predictor and noise SD both 3, the response variance is far
    // larger than the irreducible noise alone; a constant predictor at the
    // mean must do much worse than SD 3.
    let data = datagen::generate(2000, 0, 11).expect("generation succeeds");
    let y = data.y.as_slice();
    let mean = y.iter().sum::<f32>() / y.len() as f32;
    let var = y.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / y.len() as f32;
    assert!(var > 9.0 * 2.0, "response variance {var} too small");
}
