//! Per-cell result records and selection metrics.
//!
//! RMSE is delegated to `aprender::metrics`. Sensitivity and specificity
//! score a family's recovered predictor set against the known informative
//! and noise column names.

use aprender::primitives::Vector;
use serde::{Deserialize, Serialize};

use crate::datagen::is_noise_name;

/// Output of one cell: a single RMSE-labeled row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub model: String,
    pub training_size: usize,
    pub extra_vars: usize,
    pub seed: u64,
    pub rmse: f32,
}

/// One retained predictor for a cell whose family exposes selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedRecord {
    pub model: String,
    pub training_size: usize,
    pub extra_vars: usize,
    pub seed: u64,
    pub predictor: String,
}

/// Sensitivity and specificity of a recovered predictor set.
///
/// Specificity is undefined exactly when no noise predictors exist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionMetrics {
    pub sensitivity: f32,
    pub specificity: Option<f32>,
}

/// Root mean squared error over the held-out test set.
pub fn rmse(y_pred: &Vector<f32>, y_true: &Vector<f32>) -> f32 {
    aprender::metrics::rmse(y_pred, y_true)
}

/// Scores a selected predictor set against the naming convention.
///
/// `n_informative` is 20, or 22 for the linear families whose engineered
/// interaction columns count as informative.
pub fn selection_metrics(
    selected: &[String],
    n_informative: usize,
    extra_vars: usize,
) -> SelectionMetrics {
    let n_noise_selected = selected.iter().filter(|s| is_noise_name(s)).count();
    let n_informative_selected = selected.len() - n_noise_selected;

    let sensitivity = (n_informative_selected as f32 / n_informative as f32).min(1.0);
    let specificity = if extra_vars == 0 {
        None
    } else {
        Some(1.0 - n_noise_selected as f32 / extra_vars as f32)
    };

    SelectionMetrics {
        sensitivity,
        specificity,
    }
}

/// Paired percent change from the seed-matched extra_vars = 0 baseline.
pub fn pct_change(rmse_at: f64, rmse_baseline: f64) -> f64 {
    100.0 * (rmse_at - rmse_baseline) / rmse_baseline
}

/// Paired fold increase from the seed-matched extra_vars = 0 baseline.
pub fn fold_increase(rmse_at: f64, rmse_baseline: f64) -> f64 {
    rmse_at / rmse_baseline
}

#[cfg(test)]
mod tests {
    use super::*;
    use aprender::primitives::Vector;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_rmse_matches_hand_computation() {
        let pred = Vector::from_slice(&[1.0, 2.0, 3.0]);
        let truth = Vector::from_slice(&[1.0, 2.0, 5.0]);
        // Squared errors: 0, 0, 4 -> mean 4/3.
        let expected = (4.0f32 / 3.0).sqrt();
        assert!((rmse(&pred, &truth) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_perfect_selection() {
        let selected = names(&["x1", "x2", "x3"]);
        let m = selection_metrics(&selected, 3, 10);
        assert!((m.sensitivity - 1.0).abs() < 1e-6);
        assert_eq!(m.specificity, Some(1.0));
    }

    #[test]
    fn test_false_positive_selection() {
        let selected = names(&["x1", "noise3", "noise7"]);
        let m = selection_metrics(&selected, 20, 10);
        assert!((m.sensitivity - 0.05).abs() < 1e-6);
        let spec = m.specificity.expect("defined when extra_vars > 0");
        assert!((spec - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_specificity_undefined_at_baseline() {
        let selected = names(&["x1", "x2"]);
        let m = selection_metrics(&selected, 20, 0);
        assert_eq!(m.specificity, None);
    }

    #[test]
    fn test_interaction_terms_count_as_informative() {
        let selected = names(&["x5:x6", "x7:x8:x9", "x1"]);
        let m = selection_metrics(&selected, 22, 25);
        assert!((m.sensitivity - 3.0 / 22.0).abs() < 1e-6);
        assert_eq!(m.specificity, Some(1.0));
    }

    #[test]
    fn test_empty_selection() {
        let m = selection_metrics(&[], 20, 25);
        assert_eq!(m.sensitivity, 0.0);
        assert_eq!(m.specificity, Some(1.0));
    }

    #[test]
    fn test_baseline_identities() {
        assert!((pct_change(3.0, 3.0)).abs() < 1e-12);
        assert!((fold_increase(3.0, 3.0) - 1.0).abs() < 1e-12);
        assert!((pct_change(4.5, 3.0) - 50.0).abs() < 1e-9);
        assert!((fold_increase(4.5, 3.0) - 1.5).abs() < 1e-9);
    }
}
