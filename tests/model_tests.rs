//! Model family integration tests
//!
//! Every family must fit a small simulated cell, predict on held-out rows,
//! and report selection only when its family exposes it.

use ruido::datagen::{self, SplitSpec};
use ruido::models::{self, ModelFamily};
use ruido::tuning::TuningBudget;

fn small_cell(extra_vars: usize) -> (datagen::SimulatedDataset, datagen::SimulatedDataset) {
    let spec = SplitSpec {
        train_rows: 150,
        test_rows: 100,
        extra_vars,
        seed: 1,
    };
    datagen::generate_split(&spec).expect("generation succeeds")
}

#[test]
fn test_every_family_fits_and_predicts() {
    let (train, test) = small_cell(5);
    let budget = TuningBudget {
        cv_folds: 3,
        random_candidates: 3,
    };
    for family in ModelFamily::ALL {
        let outcome = models::fit_and_predict(family, &train, &test, &budget, 1)
            .unwrap_or_else(|e| panic!("{family} failed: {e}"));
        assert_eq!(outcome.predictions.len(), test.n_rows(), "{family}");
        assert!(
            outcome
                .predictions
                .as_slice()
                .iter()
                .all(|p| p.is_finite()),
            "{family} produced non-finite predictions"
        );
        assert_eq!(
            outcome.selected.is_some(),
            family.has_selection(),
            "{family} selection capability mismatch"
        );
    }
}

#[test]
fn test_selection_families_report_valid_names() {
    let (train, test) = small_cell(10);
    let budget = TuningBudget {
        cv_folds: 3,
        random_candidates: 3,
    };
    for &family in ModelFamily::ALL.iter().filter(|f| f.has_selection()) {
        let outcome = models::fit_and_predict(family, &train, &test, &budget, 1)
            .unwrap_or_else(|e| panic!("{family} failed: {e}"));
        let selected = outcome.selected.expect("selection family");
        let valid: Vec<&str> = train
            .names
            .iter()
            .map(String::as_str)
            .chain(["x5:x6", "x7:x8:x9"])
            .collect();
        for name in &selected {
            assert!(valid.contains(&name.as_str()), "{family} selected unknown {name}");
        }
        // No duplicates in a selected set.
        let mut deduped = selected.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), selected.len(), "{family} duplicated names");
    }
}

#[test]
fn test_linear_beats_mean_on_signal() {
    let (train, test) = small_cell(0);
    let budget = TuningBudget::default();
    let outcome = models::fit_and_predict(ModelFamily::Linear, &train, &test, &budget, 1)
        .expect("linear fits");

    let y = test.y.as_slice();
    let mean = y.iter().sum::<f32>() / y.len() as f32;
    let mean_rmse = (y.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / y.len() as f32).sqrt();
    let rmse = ruido::metrics::rmse(&outcome.predictions, &test.y);
    assert!(
        rmse < mean_rmse,
        "linear rmse {rmse} should beat constant-mean rmse {mean_rmse}"
    );
}

#[test]
fn test_family_names_round_trip() {
    for family in ModelFamily::ALL {
        assert_eq!(ModelFamily::from_name(family.name()), Some(family));
    }
    assert_eq!(ModelFamily::from_name("ridge"), None);
}
