//! Property-based tests for selection metrics and the experiment grid
//!
//! Bounds that must hold for any recovered predictor set, and structural
//! invariants of grid expansion.

use proptest::prelude::*;

use ruido::datagen;
use ruido::grid::{ExperimentGrid, WorkUnit};
use ruido::metrics;
use ruido::models::ModelFamily;

fn arb_selected(extra_vars: usize) -> impl Strategy<Value = Vec<String>> {
    let informative = prop::sample::select(
        (1..=datagen::N_INFORMATIVE)
            .map(|i| format!("x{i}"))
            .collect::<Vec<_>>(),
    );
    let noise = prop::sample::select(
        (1..=extra_vars.max(1))
            .map(|i| format!("noise{i}"))
            .collect::<Vec<_>>(),
    );
    let any = prop_oneof![informative, noise];
    prop::collection::vec(any, 0..30).prop_map(|mut names| {
        names.sort();
        names.dedup();
        names
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_selection_metrics_bounded(
        extra_vars in 1usize..200,
        selected in arb_selected(200),
    ) {
        let m = metrics::selection_metrics(&selected, datagen::N_INFORMATIVE, extra_vars);
        prop_assert!((0.0..=1.0).contains(&m.sensitivity));
        let spec = m.specificity.expect("defined when extra_vars > 0");
        prop_assert!(spec <= 1.0);
    }

    #[test]
    fn prop_specificity_undefined_exactly_at_baseline(
        selected in arb_selected(10),
        extra_vars in 0usize..50,
    ) {
        let m = metrics::selection_metrics(&selected, datagen::N_INFORMATIVE, extra_vars);
        prop_assert_eq!(m.specificity.is_none(), extra_vars == 0);
    }

    #[test]
    fn prop_noise_names_never_informative(i in 1usize..1000) {
        let noise_name = format!("noise{i}");
        let informative_name = format!("x{i}");
        prop_assert!(datagen::is_noise_name(&noise_name));
        prop_assert!(!datagen::is_noise_name(&informative_name));
    }

    #[test]
    fn prop_grid_units_unique_and_complete(
        sizes in prop::collection::btree_set(2usize..2000, 1..4),
        extras in prop::collection::btree_set(0usize..300, 1..5),
        seeds in prop::collection::btree_set(1u64..500, 1..6),
    ) {
        let grid = ExperimentGrid {
            training_sizes: sizes.iter().copied().collect(),
            extra_vars: extras.iter().copied().collect(),
            seeds: seeds.iter().copied().collect(),
            families: vec![ModelFamily::Linear],
        };
        let units = grid.units();
        prop_assert_eq!(units.len(), sizes.len() * extras.len() * seeds.len());

        let mut seen = std::collections::HashSet::new();
        for unit in &units {
            prop_assert!(seen.insert(*unit), "duplicate unit {:?}", unit);
            prop_assert!(sizes.contains(&unit.training_size));
            prop_assert!(extras.contains(&unit.extra_vars));
            prop_assert!(seeds.contains(&unit.seed));
        }
    }

    #[test]
    fn prop_artifact_names_parseable(
        training_size in 2usize..5000,
        extra_vars in 0usize..300,
        seed in 1u64..1000,
    ) {
        let unit = WorkUnit { training_size, extra_vars, seed };
        let name = unit.artifact_name();
        prop_assert!(ruido::artifact::is_artifact_name(&name));
        let size_tag = format!("n{training_size}");
        let vars_tag = format!("v{extra_vars}");
        let seed_tag = format!("s{seed}");
        prop_assert!(name.contains(&size_tag));
        prop_assert!(name.contains(&vars_tag));
        prop_assert!(name.contains(&seed_tag));
    }
}
