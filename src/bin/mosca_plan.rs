use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use mosca_plan::app::{PlanOptions, Planner, ProgressSink};
use mosca_plan::config::ConfigLoader;
use mosca_plan::error::{ErrorKind, MoscaError};
use mosca_plan::output::{JsonOutput, LogSink, OutputMode, SummaryOutput};

#[derive(Parser)]
#[command(name = "mosca-plan")]
#[command(about = "Build the task graph of a MOSCA multi-omics run")]
#[command(version, author)]
struct Cli {
    /// Print a human-readable summary instead of JSON.
    #[arg(long, global = true)]
    summary: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Classify experiments, resolve stages and emit the task graph")]
    Plan(PlanArgs),
    #[command(about = "Check a configuration without building the graph")]
    Validate(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the JSON or YAML configuration (defaults to ./config.json).
    #[arg(long, short)]
    config: Option<String>,
}

#[derive(Args)]
struct PlanArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Do not write exps.tsv or the config snapshot.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<MoscaError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MoscaError) -> u8 {
    match error.kind() {
        ErrorKind::Validation => 2,
        ErrorKind::UnknownSample
        | ErrorKind::UnresolvedDependency
        | ErrorKind::AmbiguousOutput => 3,
        ErrorKind::Io => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = if cli.summary {
        OutputMode::Summary
    } else {
        OutputMode::Json
    };
    let sink: &dyn ProgressSink = match mode {
        OutputMode::Summary => &LogSink,
        OutputMode::Json => &JsonOutput,
    };
    let planner = Planner::new();

    match cli.command {
        Commands::Plan(args) => {
            let config = ConfigLoader::resolve(args.config.config.as_deref())?;
            let options = PlanOptions {
                dry_run: args.dry_run,
            };
            let result = planner.plan(config, options, sink)?;
            match mode {
                OutputMode::Json => JsonOutput::print_plan(&result).into_diagnostic(),
                OutputMode::Summary => SummaryOutput::print_plan(&result).into_diagnostic(),
            }
        }
        Commands::Validate(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref())?;
            let result = planner.validate(config, sink)?;
            match mode {
                OutputMode::Json => JsonOutput::print_validate(&result).into_diagnostic(),
                OutputMode::Summary => SummaryOutput::print_validate(&result).into_diagnostic(),
            }
        }
    }
}
