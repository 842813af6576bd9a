//! Experimental design: the factorial grid of simulation cells.
//!
//! A work unit is one (training_size, extra_vars, seed) combination; a cell
//! is one work unit crossed with a model family. Units are fully independent
//! and each one persists its own artifact.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuidoError};
use crate::models::ModelFamily;

/// Training sizes used by the reference design.
pub const DEFAULT_TRAINING_SIZES: [usize; 2] = [500, 1000];

/// Held-out test rows per unit.
pub const DEFAULT_TEST_ROWS: usize = 5000;

/// Default number of repeated seeds.
pub const DEFAULT_SEEDS: u64 = 100;

/// Default worker pool size for a sweep.
pub const DEFAULT_JOBS: usize = 18;

/// Noise-predictor counts used by the reference design: 0, 25, ..., 200.
pub fn default_extra_vars() -> Vec<usize> {
    (0..=8).map(|i| i * 25).collect()
}

/// Seeds 1..=100.
pub fn default_seeds() -> Vec<u64> {
    (1..=DEFAULT_SEEDS).collect()
}

/// One independent unit of work: all requested model families are fitted on
/// the same train/test realization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkUnit {
    pub training_size: usize,
    pub extra_vars: usize,
    pub seed: u64,
}

impl WorkUnit {
    /// Artifact file name for this unit, e.g. `cell_n500_v25_s1.json`.
    pub fn artifact_name(&self) -> String {
        format!(
            "cell_n{}_v{}_s{}.json",
            self.training_size, self.extra_vars, self.seed
        )
    }
}

/// The full factorial design driving a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentGrid {
    pub training_sizes: Vec<usize>,
    pub extra_vars: Vec<usize>,
    pub seeds: Vec<u64>,
    pub families: Vec<ModelFamily>,
}

impl ExperimentGrid {
    /// The reference study design: {500, 1000} x {0, 25, ..., 200} x 1..=100
    /// over all ten families.
    pub fn study_default() -> Self {
        Self {
            training_sizes: DEFAULT_TRAINING_SIZES.to_vec(),
            extra_vars: default_extra_vars(),
            seeds: default_seeds(),
            families: ModelFamily::ALL.to_vec(),
        }
    }

    /// Rejects invalid designs before any cell runs.
    pub fn validate(&self) -> Result<()> {
        if self.training_sizes.is_empty() {
            return Err(RuidoError::InvalidParameter(
                "at least one training size is required".into(),
            ));
        }
        if let Some(&n) = self.training_sizes.iter().find(|&&n| n < 2) {
            return Err(RuidoError::InvalidParameter(format!(
                "training size must be >= 2, got {n}"
            )));
        }
        if self.extra_vars.is_empty() {
            return Err(RuidoError::InvalidParameter(
                "at least one extra_vars value is required".into(),
            ));
        }
        if self.seeds.is_empty() {
            return Err(RuidoError::InvalidParameter(
                "at least one seed is required".into(),
            ));
        }
        if self.families.is_empty() {
            return Err(RuidoError::InvalidParameter(
                "at least one model family is required".into(),
            ));
        }
        Ok(())
    }

    /// Expands the Cartesian product into independent work units.
    pub fn units(&self) -> Vec<WorkUnit> {
        let mut units =
            Vec::with_capacity(self.training_sizes.len() * self.extra_vars.len() * self.seeds.len());
        for &training_size in &self.training_sizes {
            for &extra_vars in &self.extra_vars {
                for &seed in &self.seeds {
                    units.push(WorkUnit {
                        training_size,
                        extra_vars,
                        seed,
                    });
                }
            }
        }
        units
    }
}

/// Parses a seed specification: either `a..b` (inclusive) or a comma list.
pub fn parse_seed_spec(spec: &str) -> Result<Vec<u64>> {
    let spec = spec.trim();
    if let Some((lo, hi)) = spec.split_once("..") {
        let lo: u64 = lo
            .trim()
            .parse()
            .map_err(|_| RuidoError::InvalidParameter(format!("bad seed range start: {lo:?}")))?;
        let hi: u64 = hi
            .trim()
            .parse()
            .map_err(|_| RuidoError::InvalidParameter(format!("bad seed range end: {hi:?}")))?;
        if lo > hi {
            return Err(RuidoError::InvalidParameter(format!(
                "empty seed range {lo}..{hi}"
            )));
        }
        return Ok((lo..=hi).collect());
    }
    spec.split(',')
        .map(|s| {
            s.trim()
                .parse::<u64>()
                .map_err(|_| RuidoError::InvalidParameter(format!("bad seed value: {s:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_design_dimensions() {
        let grid = ExperimentGrid::study_default();
        assert_eq!(grid.training_sizes, vec![500, 1000]);
        assert_eq!(grid.extra_vars, vec![0, 25, 50, 75, 100, 125, 150, 175, 200]);
        assert_eq!(grid.seeds.len(), 100);
        assert_eq!(grid.families.len(), 10);
        assert_eq!(grid.units().len(), 2 * 9 * 100);
    }

    #[test]
    fn test_every_unit_has_a_baseline_partner() {
        let grid = ExperimentGrid::study_default();
        let units = grid.units();
        for unit in &units {
            let baselines = units
                .iter()
                .filter(|u| {
                    u.training_size == unit.training_size
                        && u.seed == unit.seed
                        && u.extra_vars == 0
                })
                .count();
            assert_eq!(baselines, 1);
        }
    }

    #[test]
    fn test_artifact_name_round_trip_coordinates() {
        let unit = WorkUnit {
            training_size: 1000,
            extra_vars: 75,
            seed: 42,
        };
        assert_eq!(unit.artifact_name(), "cell_n1000_v75_s42.json");
    }

    #[test]
    fn test_validate_rejects_tiny_training_size() {
        let mut grid = ExperimentGrid::study_default();
        grid.training_sizes = vec![1];
        assert!(grid.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_axes() {
        let mut grid = ExperimentGrid::study_default();
        grid.seeds.clear();
        assert!(grid.validate().is_err());
    }

    #[test]
    fn test_parse_seed_spec_range_and_list() {
        assert_eq!(parse_seed_spec("1..4").expect("range"), vec![1, 2, 3, 4]);
        assert_eq!(parse_seed_spec("7").expect("single"), vec![7]);
        assert_eq!(parse_seed_spec("2, 5, 9").expect("list"), vec![2, 5, 9]);
        assert!(parse_seed_spec("9..2").is_err());
        assert!(parse_seed_spec("x..y").is_err());
    }
}
