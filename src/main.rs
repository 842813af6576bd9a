use anyhow::Result;
use clap::Parser;
use ruido::cli::{Cli, Command};
use ruido::runner::{self, SweepOptions};
use ruido::tuning::TuningBudget;
use ruido::{aggregate, cli, grid};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for progress and debug output
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_run(args: cli::RunArgs) -> Result<()> {
    args.validate()?;
    let unit = grid::WorkUnit {
        training_size: args.training_size,
        extra_vars: args.extra_vars,
        seed: args.seed,
    };
    let path = args.out.join(unit.artifact_name());
    if path.exists() && !args.force {
        println!("exists: {} (use --force to re-run)", path.display());
        return Ok(());
    }
    let families = args.families()?;
    let outcome = runner::run_unit(&unit, &families, args.test_rows, &TuningBudget::default())?;
    let written = outcome.artifact.write(&args.out)?;
    println!(
        "wrote {} ({} models, {} failed)",
        written.display(),
        outcome.artifact.results.len(),
        outcome.cells_failed
    );
    Ok(())
}

fn cmd_sweep(args: cli::SweepArgs) -> Result<()> {
    let experiment = cli::build_grid(
        args.training_sizes,
        args.extra_vars,
        &args.seeds,
        args.models,
    )?;
    let opts = SweepOptions {
        out_dir: args.out,
        jobs: args.jobs,
        force: args.force,
        test_rows: args.test_rows,
        budget: TuningBudget::default(),
    };
    let summary = runner::sweep(&experiment, &opts)?;
    println!(
        "sweep: {} units ({} completed, {} skipped, {} failed); {} model cells failed",
        summary.units_total,
        summary.units_completed,
        summary.units_skipped,
        summary.units_failed,
        summary.cells_failed
    );
    Ok(())
}

fn cmd_aggregate(args: cli::AggregateArgs) -> Result<()> {
    let summary = aggregate::aggregate(&args.results, &args.out)?;
    println!(
        "aggregated {} artifacts ({} skipped): {} result rows, {} predictor rows",
        summary.artifacts_loaded,
        summary.artifacts_skipped,
        summary.perf_rows,
        summary.predictor_rows
    );
    println!(
        "wrote perf_res.csv, predictors.csv, summary_rmse.csv, summary_selection.csv to {}",
        args.out.display()
    );
    Ok(())
}

fn cmd_grid(args: cli::GridArgs) -> Result<()> {
    let experiment = cli::build_grid(
        args.training_sizes,
        args.extra_vars,
        &args.seeds,
        args.models,
    )?;
    let units = experiment.units();
    for unit in &units {
        println!("{}", unit.artifact_name());
    }
    println!(
        "{} units x {} families = {} model fits",
        units.len(),
        experiment.families.len(),
        units.len() * experiment.families.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Sweep(args) => cmd_sweep(args),
        Command::Aggregate(args) => cmd_aggregate(args),
        Command::Grid(args) => cmd_grid(args),
    }
}
