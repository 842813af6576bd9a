//! Aggregation of per-unit artifacts into study-level CSV outputs.
//!
//! Reads every unit artifact from a results directory and emits four files:
//!
//! - `perf_res.csv` — every per-cell RMSE row
//! - `predictors.csv` — every retained-predictor row
//! - `summary_rmse.csv` — per (model, training_size, extra_vars) mean RMSE
//!   plus paired degradation against the seed-matched extra_vars = 0 baseline
//! - `summary_selection.csv` — selection sensitivity/specificity/FPR means
//!   for families that expose selection, restricted to extra_vars > 0
//!
//! Unreadable artifacts are logged and skipped; seeds without a baseline
//! cell are excluded from the paired columns only.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::artifact::{self, CellArtifact};
use crate::error::{Result, RuidoError};
use crate::metrics::{self, ResultRecord, SelectedRecord};
use crate::models::ModelFamily;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RmseSummaryRow {
    pub model: String,
    pub training_size: usize,
    pub extra_vars: usize,
    pub n_seeds: usize,
    pub mean_rmse: f64,
    pub n_paired: usize,
    pub mean_pct_change: Option<f64>,
    pub mean_fold_increase: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionSummaryRow {
    pub model: String,
    pub training_size: usize,
    pub extra_vars: usize,
    pub n_seeds: usize,
    pub mean_sensitivity: f64,
    pub mean_specificity: f64,
    pub mean_false_positive_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    pub artifacts_loaded: usize,
    pub artifacts_skipped: usize,
    pub perf_rows: usize,
    pub predictor_rows: usize,
    pub rmse_groups: usize,
    pub selection_groups: usize,
}

/// Loads every parseable artifact under `dir`, skipping corrupt files.
pub fn load_artifacts(dir: &Path) -> Result<(Vec<CellArtifact>, usize)> {
    let mut artifacts = Vec::new();
    let mut skipped = 0usize;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !artifact::is_artifact_name(name) {
            continue;
        }
        match CellArtifact::read(&entry.path()) {
            Ok(a) => artifacts.push(a),
            Err(err) => {
                warn!(%err, "skipping unreadable artifact");
                skipped += 1;
            }
        }
    }
    if artifacts.is_empty() {
        return Err(RuidoError::Artifact {
            path: dir.display().to_string(),
            reason: "no unit artifacts found".to_string(),
        });
    }
    // Deterministic output regardless of directory iteration order.
    artifacts.sort_by_key(|a| (a.training_size, a.extra_vars, a.seed));
    Ok((artifacts, skipped))
}

/// Mean RMSE per condition with paired degradation columns.
///
/// Each row's paired columns average per-seed pct-change and fold-increase
/// against that seed's extra_vars = 0 cell for the same model and size.
/// Seeds missing a baseline contribute to `mean_rmse` but not the paired
/// columns; `n_paired` records how many seeds paired up.
pub fn summarize_rmse(records: &[ResultRecord]) -> Vec<RmseSummaryRow> {
    let mut baselines: HashMap<(&str, usize, u64), f64> = HashMap::new();
    for r in records {
        if r.extra_vars == 0 {
            baselines.insert((r.model.as_str(), r.training_size, r.seed), f64::from(r.rmse));
        }
    }

    let mut groups: BTreeMap<(String, usize, usize), Vec<&ResultRecord>> = BTreeMap::new();
    for r in records {
        groups
            .entry((r.model.clone(), r.training_size, r.extra_vars))
            .or_default()
            .push(r);
    }

    let mut rows = Vec::with_capacity(groups.len());
    for ((model, training_size, extra_vars), cells) in groups {
        let mean_rmse =
            cells.iter().map(|r| f64::from(r.rmse)).sum::<f64>() / cells.len() as f64;

        let mut pct_sum = 0.0f64;
        let mut fold_sum = 0.0f64;
        let mut n_paired = 0usize;
        for r in &cells {
            if let Some(&baseline) = baselines.get(&(model.as_str(), training_size, r.seed)) {
                pct_sum += metrics::pct_change(f64::from(r.rmse), baseline);
                fold_sum += metrics::fold_increase(f64::from(r.rmse), baseline);
                n_paired += 1;
            }
        }
        let (mean_pct_change, mean_fold_increase) = if n_paired > 0 {
            (Some(pct_sum / n_paired as f64), Some(fold_sum / n_paired as f64))
        } else {
            (None, None)
        };

        rows.push(RmseSummaryRow {
            model,
            training_size,
            extra_vars,
            n_seeds: cells.len(),
            mean_rmse,
            n_paired,
            mean_pct_change,
            mean_fold_increase,
        });
    }
    rows
}

/// Selection quality per condition, for families that expose selection.
///
/// A successful result row whose family exposes selection but that retained
/// nothing counts as an empty set: sensitivity 0, specificity 1. Conditions
/// with extra_vars = 0 are excluded since specificity is undefined there.
pub fn summarize_selection(
    records: &[ResultRecord],
    selected: &[SelectedRecord],
) -> Vec<SelectionSummaryRow> {
    let mut picks: HashMap<(&str, usize, usize, u64), Vec<String>> = HashMap::new();
    for s in selected {
        picks
            .entry((s.model.as_str(), s.training_size, s.extra_vars, s.seed))
            .or_default()
            .push(s.predictor.clone());
    }

    let mut groups: BTreeMap<(String, usize, usize), (f64, f64, usize)> = BTreeMap::new();
    for r in records {
        if r.extra_vars == 0 {
            continue;
        }
        let Some(family) = ModelFamily::from_name(&r.model) else {
            warn!(model = %r.model, "unknown model name in results; skipping");
            continue;
        };
        if !family.has_selection() {
            continue;
        }
        let empty = Vec::new();
        let cell_picks = picks
            .get(&(r.model.as_str(), r.training_size, r.extra_vars, r.seed))
            .unwrap_or(&empty);
        let m = metrics::selection_metrics(cell_picks, family.n_informative(), r.extra_vars);
        let specificity = m.specificity.unwrap_or(1.0);

        let entry = groups
            .entry((r.model.clone(), r.training_size, r.extra_vars))
            .or_insert((0.0, 0.0, 0));
        entry.0 += f64::from(m.sensitivity);
        entry.1 += f64::from(specificity);
        entry.2 += 1;
    }

    groups
        .into_iter()
        .map(|((model, training_size, extra_vars), (sens, spec, n))| {
            let mean_specificity = spec / n as f64;
            SelectionSummaryRow {
                model,
                training_size,
                extra_vars,
                n_seeds: n,
                mean_sensitivity: sens / n as f64,
                mean_specificity,
                mean_false_positive_rate: 1.0 - mean_specificity,
            }
        })
        .collect()
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<PathBuf> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}

/// Reads all artifacts under `results_dir` and writes the four CSV outputs
/// into `out_dir`.
pub fn aggregate(results_dir: &Path, out_dir: &Path) -> Result<AggregateSummary> {
    let (artifacts, skipped) = load_artifacts(results_dir)?;
    fs::create_dir_all(out_dir)?;

    let mut records: Vec<ResultRecord> = Vec::new();
    let mut selected: Vec<SelectedRecord> = Vec::new();
    for a in &artifacts {
        records.extend(a.results.iter().cloned());
        selected.extend(a.selected.iter().cloned());
    }

    let rmse_rows = summarize_rmse(&records);
    let selection_rows = summarize_selection(&records, &selected);

    write_csv(&out_dir.join("perf_res.csv"), &records)?;
    write_csv(&out_dir.join("predictors.csv"), &selected)?;
    write_csv(&out_dir.join("summary_rmse.csv"), &rmse_rows)?;
    write_csv(&out_dir.join("summary_selection.csv"), &selection_rows)?;

    let summary = AggregateSummary {
        artifacts_loaded: artifacts.len(),
        artifacts_skipped: skipped,
        perf_rows: records.len(),
        predictor_rows: selected.len(),
        rmse_groups: rmse_rows.len(),
        selection_groups: selection_rows.len(),
    };
    info!(
        artifacts = summary.artifacts_loaded,
        skipped = summary.artifacts_skipped,
        perf_rows = summary.perf_rows,
        out = %out_dir.display(),
        "aggregation complete"
    );
    Ok(summary)
}
