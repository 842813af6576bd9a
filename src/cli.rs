//! CLI argument parsing for Ruido

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::datagen;
use crate::error::{Result, RuidoError};
use crate::grid::{self, ExperimentGrid};
use crate::models::ModelFamily;

#[derive(Parser, Debug)]
#[command(name = "ruido")]
#[command(version)]
#[command(
    about = "Simulation study of regression model degradation under noise predictors",
    long_about = None
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single work unit and write its artifact
    Run(RunArgs),
    /// Run the full experiment grid on a worker pool
    Sweep(SweepArgs),
    /// Aggregate unit artifacts into the study CSV outputs
    Aggregate(AggregateArgs),
    /// Print the experiment grid without running anything
    Grid(GridArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Training set size
    #[arg(short = 'n', long = "training-size", value_name = "ROWS")]
    pub training_size: usize,

    /// Number of appended noise predictors
    #[arg(short = 'x', long = "extra-vars", value_name = "COUNT")]
    pub extra_vars: usize,

    /// Simulation seed for this unit
    #[arg(short = 's', long = "seed", value_name = "SEED")]
    pub seed: u64,

    /// Model families to fit (comma separated; default: all ten)
    #[arg(short = 'm', long = "models", value_delimiter = ',', value_enum)]
    pub models: Option<Vec<ModelFamily>>,

    /// Held-out test set size
    #[arg(long = "test-rows", value_name = "ROWS", default_value_t = grid::DEFAULT_TEST_ROWS)]
    pub test_rows: usize,

    /// Overwrite an existing artifact for this unit
    #[arg(long = "force")]
    pub force: bool,

    /// Directory for unit artifacts
    #[arg(short = 'o', long = "out", value_name = "DIR", default_value = "results")]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Training set sizes (comma separated; default: 500,1000)
    #[arg(
        short = 'n',
        long = "training-size",
        value_name = "ROWS",
        value_delimiter = ','
    )]
    pub training_sizes: Option<Vec<usize>>,

    /// Noise predictor counts (comma separated; default: 0,25,...,200)
    #[arg(
        short = 'x',
        long = "extra-vars",
        value_name = "COUNT",
        value_delimiter = ','
    )]
    pub extra_vars: Option<Vec<usize>>,

    /// Seeds, as an inclusive range "1..100" or a comma list "1,2,3"
    #[arg(short = 's', long = "seeds", value_name = "SPEC", default_value = "1..100")]
    pub seeds: String,

    /// Model families to fit (comma separated; default: all ten)
    #[arg(short = 'm', long = "models", value_delimiter = ',', value_enum)]
    pub models: Option<Vec<ModelFamily>>,

    /// Held-out test set size
    #[arg(long = "test-rows", value_name = "ROWS", default_value_t = grid::DEFAULT_TEST_ROWS)]
    pub test_rows: usize,

    /// Worker pool size
    #[arg(short = 'j', long = "jobs", value_name = "N", default_value_t = grid::DEFAULT_JOBS)]
    pub jobs: usize,

    /// Re-run units whose artifact already exists
    #[arg(long = "force")]
    pub force: bool,

    /// Directory for unit artifacts
    #[arg(short = 'o', long = "out", value_name = "DIR", default_value = "results")]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// Directory holding unit artifacts
    #[arg(short = 'r', long = "results", value_name = "DIR", default_value = "results")]
    pub results: PathBuf,

    /// Directory for the CSV outputs
    #[arg(short = 'o', long = "out", value_name = "DIR", default_value = "results")]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct GridArgs {
    /// Training set sizes (comma separated; default: 500,1000)
    #[arg(
        short = 'n',
        long = "training-size",
        value_name = "ROWS",
        value_delimiter = ','
    )]
    pub training_sizes: Option<Vec<usize>>,

    /// Noise predictor counts (comma separated; default: 0,25,...,200)
    #[arg(
        short = 'x',
        long = "extra-vars",
        value_name = "COUNT",
        value_delimiter = ','
    )]
    pub extra_vars: Option<Vec<usize>>,

    /// Seeds, as an inclusive range "1..100" or a comma list "1,2,3"
    #[arg(short = 's', long = "seeds", value_name = "SPEC", default_value = "1..100")]
    pub seeds: String,

    /// Model families (comma separated; default: all ten)
    #[arg(short = 'm', long = "models", value_delimiter = ',', value_enum)]
    pub models: Option<Vec<ModelFamily>>,
}

fn families_or_all(models: Option<Vec<ModelFamily>>) -> Result<Vec<ModelFamily>> {
    let families = models.unwrap_or_else(|| ModelFamily::ALL.to_vec());
    if families.is_empty() {
        return Err(RuidoError::InvalidParameter(
            "at least one model family is required".to_string(),
        ));
    }
    Ok(families)
}

/// Builds the grid a `sweep` or `grid` invocation describes.
pub fn build_grid(
    training_sizes: Option<Vec<usize>>,
    extra_vars: Option<Vec<usize>>,
    seeds: &str,
    models: Option<Vec<ModelFamily>>,
) -> Result<ExperimentGrid> {
    let grid = ExperimentGrid {
        training_sizes: training_sizes.unwrap_or_else(|| grid::DEFAULT_TRAINING_SIZES.to_vec()),
        extra_vars: extra_vars.unwrap_or_else(grid::default_extra_vars),
        seeds: grid::parse_seed_spec(seeds)?,
        families: families_or_all(models)?,
    };
    grid.validate()?;
    Ok(grid)
}

impl RunArgs {
    pub fn families(&self) -> Result<Vec<ModelFamily>> {
        families_or_all(self.models.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.training_size < datagen::N_INFORMATIVE {
            return Err(RuidoError::InvalidParameter(format!(
                "training size must be >= {}, got {}",
                datagen::N_INFORMATIVE,
                self.training_size
            )));
        }
        if self.test_rows == 0 {
            return Err(RuidoError::InvalidParameter(
                "test-rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_run_args_parse() {
        let cli = Cli::parse_from([
            "ruido", "run", "-n", "500", "-x", "25", "-s", "3", "-m", "linear,knn",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.training_size, 500);
        assert_eq!(args.extra_vars, 25);
        assert_eq!(args.seed, 3);
        assert_eq!(
            args.families().expect("families"),
            vec![ModelFamily::Linear, ModelFamily::Knn]
        );
        assert_eq!(args.test_rows, grid::DEFAULT_TEST_ROWS);
    }

    #[test]
    fn test_sweep_defaults_build_study_grid() {
        let cli = Cli::parse_from(["ruido", "sweep"]);
        let Command::Sweep(args) = cli.command else {
            panic!("expected sweep subcommand");
        };
        let built = build_grid(
            args.training_sizes,
            args.extra_vars,
            &args.seeds,
            args.models,
        )
        .expect("grid");
        assert_eq!(built, ExperimentGrid::study_default());
        assert_eq!(args.jobs, grid::DEFAULT_JOBS);
    }

    #[test]
    fn test_sweep_custom_seed_range() {
        let cli = Cli::parse_from(["ruido", "sweep", "-s", "5..8", "-n", "200"]);
        let Command::Sweep(args) = cli.command else {
            panic!("expected sweep subcommand");
        };
        let built = build_grid(
            args.training_sizes,
            args.extra_vars,
            &args.seeds,
            args.models,
        )
        .expect("grid");
        assert_eq!(built.seeds, vec![5, 6, 7, 8]);
        assert_eq!(built.training_sizes, vec![200]);
    }

    #[test]
    fn test_run_args_validate_rejects_tiny_training() {
        let cli = Cli::parse_from(["ruido", "run", "-n", "5", "-x", "0", "-s", "1"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert!(args.validate().is_err());
    }
}
