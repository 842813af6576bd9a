//! Work unit execution and the parallel sweep driver.
//!
//! A unit simulates one dataset pair, fits every requested family, and
//! persists a [`CellArtifact`]. Model failures within a unit are isolated:
//! the failing family is logged and dropped while the rest of the unit's
//! rows survive. The sweep itself only reports failure when no unit at all
//! produced an artifact.

use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::artifact::CellArtifact;
use crate::datagen::{self, SplitSpec};
use crate::error::{Result, RuidoError};
use crate::grid::{ExperimentGrid, WorkUnit};
use crate::metrics::{self, ResultRecord, SelectedRecord};
use crate::models::{self, ModelFamily};
use crate::tuning::TuningBudget;

#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub out_dir: PathBuf,
    pub jobs: usize,
    pub force: bool,
    pub test_rows: usize,
    pub budget: TuningBudget,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub units_total: usize,
    pub units_completed: usize,
    pub units_skipped: usize,
    pub units_failed: usize,
    pub cells_completed: usize,
    pub cells_failed: usize,
}

/// Outcome of one unit: the artifact plus how many families failed in it.
#[derive(Debug)]
pub struct UnitOutcome {
    pub artifact: CellArtifact,
    pub cells_failed: usize,
}

/// Simulates the unit's train/test pair and fits every family against it.
///
/// Errors only when dataset generation fails or every single family failed;
/// individual family failures are logged and skipped.
pub fn run_unit(
    unit: &WorkUnit,
    families: &[ModelFamily],
    test_rows: usize,
    budget: &TuningBudget,
) -> Result<UnitOutcome> {
    let spec = SplitSpec {
        train_rows: unit.training_size,
        test_rows,
        extra_vars: unit.extra_vars,
        seed: unit.seed,
    };
    let (train, test) = datagen::generate_split(&spec)?;

    let mut artifact = CellArtifact::new(unit);
    let mut cells_failed = 0usize;
    for &family in families {
        debug!(
            model = family.name(),
            training_size = unit.training_size,
            extra_vars = unit.extra_vars,
            seed = unit.seed,
            "fitting"
        );
        match models::fit_and_predict(family, &train, &test, budget, unit.seed) {
            Ok(outcome) => {
                let rmse = metrics::rmse(&outcome.predictions, &test.y);
                artifact.results.push(ResultRecord {
                    model: family.name().to_string(),
                    training_size: unit.training_size,
                    extra_vars: unit.extra_vars,
                    seed: unit.seed,
                    rmse,
                });
                if let Some(predictors) = outcome.selected {
                    for predictor in predictors {
                        artifact.selected.push(SelectedRecord {
                            model: family.name().to_string(),
                            training_size: unit.training_size,
                            extra_vars: unit.extra_vars,
                            seed: unit.seed,
                            predictor,
                        });
                    }
                }
            }
            Err(err) => {
                warn!(
                    model = family.name(),
                    training_size = unit.training_size,
                    extra_vars = unit.extra_vars,
                    seed = unit.seed,
                    %err,
                    "model failed; dropping its rows for this unit"
                );
                cells_failed += 1;
            }
        }
    }

    if artifact.results.is_empty() {
        return Err(RuidoError::fit(
            "all",
            format!("every family failed for unit {}", unit.artifact_name()),
        ));
    }
    Ok(UnitOutcome {
        artifact,
        cells_failed,
    })
}

/// Runs the full grid on a bounded worker pool, writing one artifact per
/// unit. Units whose artifact already exists are skipped unless `force`.
pub fn sweep(grid: &ExperimentGrid, opts: &SweepOptions) -> Result<SweepSummary> {
    grid.validate()?;
    if opts.jobs == 0 {
        return Err(RuidoError::InvalidParameter(
            "jobs must be at least 1".to_string(),
        ));
    }
    std::fs::create_dir_all(&opts.out_dir)?;

    let units = grid.units();
    let mut pending = Vec::new();
    let mut skipped = 0usize;
    for unit in &units {
        let path = opts.out_dir.join(unit.artifact_name());
        if path.exists() && !opts.force {
            skipped += 1;
        } else {
            pending.push(*unit);
        }
    }

    info!(
        total = units.len(),
        pending = pending.len(),
        skipped,
        jobs = opts.jobs,
        out = %opts.out_dir.display(),
        "starting sweep"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs)
        .build()
        .map_err(|e| RuidoError::InvalidParameter(format!("worker pool: {e}")))?;

    let outcomes: Vec<std::result::Result<usize, ()>> = pool.install(|| {
        pending
            .par_iter()
            .map(|unit| {
                let written = run_unit(unit, &grid.families, opts.test_rows, &opts.budget)
                    .and_then(|outcome| {
                        outcome.artifact.write(&opts.out_dir)?;
                        Ok(outcome)
                    });
                match written {
                    Ok(outcome) => {
                        info!(
                            artifact = unit.artifact_name(),
                            models = outcome.artifact.results.len(),
                            failed = outcome.cells_failed,
                            "unit complete"
                        );
                        Ok(outcome.cells_failed)
                    }
                    Err(err) => {
                        warn!(artifact = unit.artifact_name(), %err, "unit failed");
                        Err(())
                    }
                }
            })
            .collect()
    });

    let mut summary = SweepSummary {
        units_total: units.len(),
        units_skipped: skipped,
        ..SweepSummary::default()
    };
    for outcome in outcomes {
        match outcome {
            Ok(cells_failed) => {
                summary.units_completed += 1;
                summary.cells_failed += cells_failed;
                summary.cells_completed += grid.families.len() - cells_failed;
            }
            Err(()) => summary.units_failed += 1,
        }
    }

    if summary.units_completed == 0 && !pending.is_empty() {
        return Err(RuidoError::fit(
            "all",
            format!("all {} pending units failed", pending.len()),
        ));
    }
    info!(
        completed = summary.units_completed,
        failed = summary.units_failed,
        skipped = summary.units_skipped,
        "sweep finished"
    );
    Ok(summary)
}
