use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use dagrun_core::config::{self, AppConfig, LoggingConfig};
use dagrun_core::{ExecutionEngine, ExecutionOpts, ExecutorError, TaskGraph};

mod taskfile;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[derive(thiserror::Error, Debug)]
pub(crate) enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task file error: {0}")]
    TaskFile(String),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

#[derive(Parser)]
#[command(name = "dagrun", version, about = "Dependency-aware DAG task runner")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute all tasks in a task file
    Run(RunArgs),
    /// Validate a task file and print its stage plan without executing
    Plan(PlanArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Task file (TOML, a list of [[task]] tables)
    file: PathBuf,

    /// Maximum tasks in flight per stage
    #[arg(long)]
    max_parallel: Option<usize>,

    /// Output format: text or jsonl
    #[arg(long, default_value = "text")]
    format: String,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,

    /// ASCII-only markers (no Unicode)
    #[arg(long)]
    ascii: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(clap::Args)]
struct PlanArgs {
    /// Task file (TOML, a list of [[task]] tables)
    file: PathBuf,
}

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            2
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = Args::parse();
    let cfg = config::load_default().map_err(|e| CliError::Config(e.to_string()))?;
    init_tracing(&cfg.logging)?;

    match args.command {
        Command::Run(run) => run_command(run, cfg).await,
        Command::Plan(plan) => plan_command(plan),
    }
}

async fn run_command(args: RunArgs, cfg: AppConfig) -> Result<i32, CliError> {
    let tasks = taskfile::load_tasks(&args.file)?;
    tracing::debug!(file = %args.file.display(), tasks = tasks.len(), "loaded task file");

    let opts = ExecutionOpts {
        stream_format: args.format.clone(),
        verbose: args.verbose,
        quiet: args.quiet,
        ascii: args.ascii,
        capture_bytes: cfg.executor.capture_bytes,
        max_parallel: args.max_parallel,
        progress_bar: !args.no_progress && args.format == "text" && !args.quiet,
    };

    let engine = ExecutionEngine::new(cfg.executor, opts);
    let result = engine.execute_tasks(&tasks).await?;

    Ok(if result.success { 0 } else { 1 })
}

fn plan_command(args: PlanArgs) -> Result<i32, CliError> {
    let tasks = taskfile::load_tasks(&args.file)?;

    let graph = TaskGraph::from_tasks(&tasks)?;
    graph.validate()?;

    for (i, stage) in graph.topological_sort()?.iter().enumerate() {
        println!("stage {}: {}", i, stage.join(", "));
    }

    Ok(0)
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), CliError> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone())
            .map_err(|e| CliError::Config(e.to_string()))?,
    };

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    let file_layer = match &logging.directory {
        Some(dir) if !dir.trim().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|e| CliError::Config(e.to_string()))?;
            let appender = tracing_appender::rolling::daily(dir, "dagrun.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
