//! CLI command definitions for jobwatch.
//!
//! `run` launches the dependent jobs of a batch and sees them through,
//! `watch` picks an existing batch back up, `classify` inspects one log.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::monitor::{classify_file, MonitorConfig, MonitorOverrides, Outcome};
use crate::pipeline::{run_batch, watch_batch, BatchOutcome, BatchSettings, InputDeckLauncher};
use crate::quarantine::{QuarantineLayout, SiblingMove};

/// Default job log name inside each job directory.
const DEFAULT_LOG_NAME: &str = "tc.out";

/// Launch, monitor and quarantine dependent quantum-chemistry jobs.
#[derive(Parser)]
#[command(name = "jobwatch")]
#[command(about = "Launch dependent gradient jobs, wait for them and quarantine failures")]
#[command(version)]
#[command(
    long_about = "jobwatch plans gradient jobs for every parent calculation that finished,\nwaits until each job log stops growing, classifies it and moves failed jobs\n(with their parents) into quarantine directories.\n\nExample usage:\n  jobwatch run -i ./batch/batch.yaml --interval 60\n  jobwatch watch -d ./batch --no-quarantine"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Plan and launch gradient jobs from a batch file, then monitor them.
    Run(RunArgs),

    /// Re-monitor the gradient jobs already present in a batch directory.
    Watch(WatchArgs),

    /// Print the outcome of a finished log.
    Classify(ClassifyArgs),
}

/// Monitoring flags shared by `run` and `watch`.
#[derive(clap::Args, Debug, Default)]
pub struct MonitorArgs {
    /// Per-job timeout in seconds, counted from when the log first appears.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seconds between log size samples.
    #[arg(long)]
    pub interval: Option<u64>,

    /// Number of jobs stabilized concurrently.
    #[arg(long)]
    pub parallel: Option<usize>,
}

impl MonitorArgs {
    fn overrides(&self) -> MonitorOverrides {
        MonitorOverrides {
            timeout_secs: self.timeout,
            interval_secs: self.interval,
            parallel: self.parallel,
            markers: None,
        }
    }
}

/// Arguments for `jobwatch run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Batch settings file; its directory is the batch root.
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    #[command(flatten)]
    pub monitor: MonitorArgs,

    /// Shell command started in each job directory (overrides the batch file).
    #[arg(long)]
    pub launch_command: Option<String>,

    /// Output the batch report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `jobwatch watch`.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Batch directory holding `gradient_*` job directories.
    #[arg(short = 'd', long)]
    pub dir: PathBuf,

    /// Log file name inside each job directory.
    #[arg(long, default_value = DEFAULT_LOG_NAME)]
    pub log_name: String,

    #[command(flatten)]
    pub monitor: MonitorArgs,

    /// Only report; leave failed jobs in place.
    #[arg(long)]
    pub no_quarantine: bool,

    /// Output the batch report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `jobwatch classify`.
#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    /// Log file to classify.
    pub log: PathBuf,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_run_command(args).await,
        Commands::Watch(args) => run_watch_command(args).await,
        Commands::Classify(args) => run_classify_command(args),
    }
}

async fn run_run_command(args: RunArgs) -> anyhow::Result<()> {
    let settings = BatchSettings::load(&args.input)
        .with_context(|| format!("Failed to load batch file {}", args.input.display()))?;

    let config = MonitorConfig::from_env()?
        .merge(&settings.monitor)
        .merge(&args.monitor.overrides());

    let mut launcher = InputDeckLauncher::new(&settings.launch);
    if args.launch_command.is_some() {
        launcher = launcher.with_command(args.launch_command);
    }

    info!(
        "Running batch {} ({} candidates)",
        settings.batch_dir.display(),
        settings.candidate_count()
    );
    let outcome = run_batch(&settings, config, &launcher).await?;
    print_outcome(&outcome, args.json)
}

async fn run_watch_command(args: WatchArgs) -> anyhow::Result<()> {
    if !args.dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Batch directory does not exist: {}",
            args.dir.display()
        ));
    }

    let config = MonitorConfig::from_env()?.merge(&args.monitor.overrides());
    let outcome = watch_batch(
        &args.dir,
        &args.log_name,
        &QuarantineLayout::default(),
        config,
        !args.no_quarantine,
    )
    .await?;
    print_outcome(&outcome, args.json)
}

#[derive(Debug, Serialize)]
struct ClassifyOutput<'a> {
    log: &'a Path,
    outcome: Outcome,
}

fn run_classify_command(args: ClassifyArgs) -> anyhow::Result<()> {
    let outcome = classify_file(&args.log)?;
    if args.json {
        let output = ClassifyOutput {
            log: &args.log,
            outcome,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}: {}", args.log.display(), outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &BatchOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    let report = &outcome.report;
    println!("\n=== Batch {} ===", report.run_id);
    println!("Jobs monitored: {}", report.jobs.len());
    println!("Succeeded:      {}", report.succeeded().len());
    println!("Failed:         {}", report.failed().len());
    println!("Errored:        {}", report.errored().len());
    println!("Skipped:        {}", report.skipped().len());
    if !outcome.launch_failures.is_empty() {
        println!("Not launched:   {}", outcome.launch_failures.len());
    }
    println!();

    for job in &report.jobs {
        println!(
            "  {} [{}] {:.1}s",
            job.handle.job_dir.display(),
            job.disposition,
            job.waited_secs
        );
    }
    for failure in &outcome.launch_failures {
        println!("  {} [not launched] {}", failure.job_dir.display(), failure.error);
    }

    println!("\nFailed jobs:");
    for handle in report.failed() {
        println!("  {}", handle.log_path.display());
    }
    println!("Jobs with errors:");
    for handle in report.errored() {
        println!("  {}", handle.log_path.display());
    }

    if let Some(quarantine) = &outcome.quarantine {
        println!("\n=== Quarantine ===");
        for moved in &quarantine.moved {
            println!(
                "  {} -> {}",
                moved.job_dir.display(),
                moved.destination.display()
            );
            match &moved.sibling {
                SiblingMove::Moved { from, to } => {
                    println!("    parent {} -> {}", from.display(), to.display())
                }
                SiblingMove::NotFound { expected } => {
                    println!("    parent not found: {}", expected.display())
                }
                SiblingMove::Failed { from, error } => {
                    println!("    parent {} not moved: {}", from.display(), error)
                }
            }
        }
        for failure in &quarantine.failures {
            println!("  {} not moved: {}", failure.job_dir.display(), failure.error);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command_options() {
        let cli = Cli::try_parse_from([
            "jobwatch",
            "run",
            "-i",
            "batch.yaml",
            "--interval",
            "30",
            "--parallel",
            "4",
            "--launch-command",
            "terachem tc.in",
            "--json",
        ])
        .expect("should parse");

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.input, PathBuf::from("batch.yaml"));
                assert_eq!(args.monitor.interval, Some(30));
                assert_eq!(args.monitor.parallel, Some(4));
                assert!(args.monitor.timeout.is_none());
                assert_eq!(args.launch_command.as_deref(), Some("terachem tc.in"));
                assert!(args.json);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_watch_command_defaults() {
        let cli = Cli::try_parse_from(["jobwatch", "watch", "-d", "./batch"]).expect("should parse");

        match cli.command {
            Commands::Watch(args) => {
                assert_eq!(args.log_name, DEFAULT_LOG_NAME);
                assert!(!args.no_quarantine);
                assert!(!args.json);
                assert_eq!(args.monitor.overrides(), MonitorOverrides::default());
            }
            _ => panic!("Expected Watch command"),
        }
    }

    #[test]
    fn test_global_log_level() {
        let cli = Cli::try_parse_from(["jobwatch", "classify", "tc.out", "--log-level", "debug"])
            .expect("should parse");
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Classify(_)));
    }

    #[test]
    fn test_run_requires_input() {
        assert!(Cli::try_parse_from(["jobwatch", "run"]).is_err());
    }
}
