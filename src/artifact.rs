//! Per-unit result artifacts.
//!
//! One JSON file per (training_size, extra_vars, seed) work unit, holding a
//! result row per model plus the retained-predictor rows. Artifacts are
//! written once and never mutated; re-running a sweep skips units whose
//! artifact already exists unless forced.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuidoError};
use crate::grid::WorkUnit;
use crate::metrics::{ResultRecord, SelectedRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellArtifact {
    pub training_size: usize,
    pub extra_vars: usize,
    pub seed: u64,
    pub results: Vec<ResultRecord>,
    pub selected: Vec<SelectedRecord>,
}

impl CellArtifact {
    pub fn new(unit: &WorkUnit) -> Self {
        Self {
            training_size: unit.training_size,
            extra_vars: unit.extra_vars,
            seed: unit.seed,
            results: Vec::new(),
            selected: Vec::new(),
        }
    }

    pub fn unit(&self) -> WorkUnit {
        WorkUnit {
            training_size: self.training_size,
            extra_vars: self.extra_vars,
            seed: self.seed,
        }
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.unit().artifact_name())
    }

    /// Serializes the artifact into `dir`, creating it if needed.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = self.path_in(dir);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    /// Loads one artifact; errors carry the offending path.
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| RuidoError::Artifact {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| RuidoError::Artifact {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// True for file names following the unit artifact convention.
pub fn is_artifact_name(name: &str) -> bool {
    name.starts_with("cell_n") && name.ends_with(".json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_artifact() -> CellArtifact {
        let unit = WorkUnit {
            training_size: 500,
            extra_vars: 25,
            seed: 3,
        };
        let mut artifact = CellArtifact::new(&unit);
        artifact.results.push(ResultRecord {
            model: "linear".into(),
            training_size: 500,
            extra_vars: 25,
            seed: 3,
            rmse: 3.2,
        });
        artifact.selected.push(SelectedRecord {
            model: "linear".into(),
            training_size: 500,
            extra_vars: 25,
            seed: 3,
            predictor: "x1".into(),
        });
        artifact
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let artifact = sample_artifact();
        let path = artifact.write(dir.path()).expect("write");
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("cell_n500_v25_s3.json")
        );

        let loaded = CellArtifact::read(&path).expect("read");
        assert_eq!(loaded.unit(), artifact.unit());
        assert_eq!(loaded.results, artifact.results);
        assert_eq!(loaded.selected, artifact.selected);
    }

    #[test]
    fn test_read_rejects_garbage() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("cell_n1_v0_s1.json");
        std::fs::write(&path, "not json").expect("write");
        let err = CellArtifact::read(&path).expect_err("must fail");
        assert!(err.to_string().contains("cell_n1_v0_s1.json"));
    }

    #[test]
    fn test_artifact_name_filter() {
        assert!(is_artifact_name("cell_n500_v0_s1.json"));
        assert!(!is_artifact_name("summary_rmse.csv"));
        assert!(!is_artifact_name("cell_n500_v0_s1.json.tmp"));
    }
}
