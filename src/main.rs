use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use sweeprun::batch::{is_lsf_host, BsubRunner};
use sweeprun::config::{BatchConfig, DispatchConfig, PoolConfig, RemoteConfig};
use sweeprun::error::{Result, RunnerError};
use sweeprun::scheduler::{CommandQueue, DispatchReport, Dispatcher};
use sweeprun::shutdown::install_shutdown_handler;
use sweeprun::sweep::{load_sweep_file, make_commands};
use sweeprun::target::{teardown_all, RemoteTarget, Target};
use sweeprun::worker::LocalPool;

#[derive(Parser, Debug)]
#[command(name = "sweeprun")]
#[command(version)]
#[command(about = "Capacity-aware dispatch of hyperparameter sweep experiments")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Dispatch commands onto the selected backend
    Run(RunArgs),

    /// Expand a sweep file and print the generated commands
    Expand {
        /// JSON sweep specification
        sweep_file: PathBuf,
    },
}

// =============================================================================
// Run Arguments
// =============================================================================

#[derive(Debug, Clone, ValueEnum)]
enum Backend {
    /// LSF host -> batch; hosts configured -> cluster; otherwise local
    Auto,
    Local,
    Cluster,
    Batch,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// File with one command per line
    #[arg(long, conflicts_with = "sweep_file")]
    commands_file: Option<PathBuf>,

    /// JSON sweep specification to expand into commands
    #[arg(long)]
    sweep_file: Option<PathBuf>,

    /// Execution backend
    #[arg(long, value_enum, default_value = "auto")]
    backend: Backend,

    /// Experiment name (log files, batch job names)
    #[arg(long, default_value = "sweep")]
    name: String,

    /// Threads/cores reserved by each command
    #[arg(long, default_value_t = 1)]
    threads: u32,

    // === Local pool options ===
    /// Local worker slots (default: cpus / threads - 1)
    #[arg(long)]
    workers: Option<usize>,

    // === Cluster options ===
    /// Remote hosts (comma-separated)
    #[arg(long, default_value = "")]
    hosts: String,

    /// SSH login name
    #[arg(long)]
    user: Option<String>,

    /// Seconds allowed for connecting and for remote commands
    #[arg(long, default_value_t = 3)]
    timeout: u64,

    /// Milliseconds to back off when no target has headroom
    #[arg(long, default_value_t = 3000)]
    backoff_ms: u64,

    /// Shell probe run on each host to report free capacity
    #[arg(long)]
    probe_command: Option<String>,

    /// Conda environment activated before each remote command
    #[arg(long)]
    conda_env: Option<String>,

    /// Directory changed into before each remote command
    #[arg(long)]
    run_dir: Option<String>,

    /// Remote directory pulled back after dispatch completes
    #[arg(long)]
    result_dir: Option<String>,

    // === Batch options ===
    /// Request one exclusive GPU per job
    #[arg(long)]
    gpu: bool,

    /// Wall time in minutes
    #[arg(long)]
    wall_time: Option<u32>,

    /// Memory reservation in MB
    #[arg(long)]
    memory: Option<u32>,

    /// Submit a single job array instead of one job per command
    #[arg(long)]
    array: bool,

    /// Output format for the dispatch report
    #[arg(long, short = 'o', value_enum, default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn load_commands(args: &RunArgs) -> Result<Vec<String>> {
    if let Some(path) = &args.commands_file {
        let contents = std::fs::read_to_string(path)?;
        let commands: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect();
        return Ok(commands);
    }
    if let Some(path) = &args.sweep_file {
        let spec = load_sweep_file(path)?;
        return make_commands(&spec);
    }
    Err(RunnerError::Configuration(
        "either --commands-file or --sweep-file is required".to_string(),
    ))
}

fn parse_hosts(hosts: &str) -> Vec<String> {
    hosts
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(String::from)
        .collect()
}

fn print_report(report: &DispatchReport, output: &OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => {
            let rendered = serde_json::to_string_pretty(report)
                .map_err(|e| RunnerError::Configuration(e.to_string()))?;
            println!("{}", rendered);
        }
        OutputFormat::Table => {
            println!("{:<20} {:>8}", "TARGET", "STARTED");
            for entry in &report.per_target {
                println!("{:<20} {:>8}", entry.target, entry.started);
            }
            println!(
                "{} commands started, {} failed attempts re-queued",
                report.started, report.failed_attempts
            );
        }
    }
    Ok(())
}

// =============================================================================
// Backend Runners
// =============================================================================

async fn run_local(args: &RunArgs, commands: Vec<String>) -> Result<()> {
    let config = PoolConfig {
        threads: args.threads,
        num_workers: args.workers,
        ..PoolConfig::default()
    };
    let mut pool = LocalPool::new(config);
    let workers = pool.num_workers();
    let mut queue = CommandQueue::from_commands(commands);

    let token = install_shutdown_handler();
    tokio::select! {
        result = pool.run(&mut queue) => {
            let started = result?;
            println!("{} commands started on {} local workers", started, workers);
        }
        _ = token.cancelled() => {
            tracing::warn!("dispatch stopped; running tasks were left detached");
        }
    }
    Ok(())
}

async fn run_cluster(args: &RunArgs, commands: Vec<String>) -> Result<()> {
    let hosts = parse_hosts(&args.hosts);
    if hosts.is_empty() {
        return Err(RunnerError::Configuration(
            "cluster backend requires --hosts".to_string(),
        ));
    }

    let mut remote_config = RemoteConfig {
        user: args.user.clone(),
        connect_timeout_secs: args.timeout,
        command_timeout_secs: args.timeout,
        conda_env: args.conda_env.clone(),
        run_dir: args.run_dir.clone(),
        result_dir: args.result_dir.clone(),
        ..RemoteConfig::default()
    };
    if let Some(probe) = &args.probe_command {
        remote_config.probe_command = probe.clone();
    }

    let targets: Vec<Box<dyn Target>> = hosts
        .iter()
        .map(|host| Box::new(RemoteTarget::new(host.clone(), remote_config.clone())) as Box<dyn Target>)
        .collect();

    let dispatch_config = DispatchConfig {
        threads: args.threads,
        backoff_ms: args.backoff_ms,
    };
    let mut dispatcher = Dispatcher::new(targets, &dispatch_config)?;
    let mut queue = CommandQueue::from_commands(commands);

    let token = install_shutdown_handler();
    let report = tokio::select! {
        result = dispatcher.run(&mut queue) => Some(result?),
        _ = token.cancelled() => {
            tracing::warn!("dispatch stopped; started tasks were left detached");
            None
        }
    };

    // Best-effort result pull and session close, even on interrupt.
    let mut targets = dispatcher.into_targets();
    teardown_all(&mut targets).await;

    if let Some(report) = report {
        print_report(&report, &args.output)?;
    }
    Ok(())
}

async fn run_batch(args: &RunArgs, commands: Vec<String>) -> Result<()> {
    let mut config = BatchConfig::new(args.name.clone())
        .with_threads(args.threads)
        .with_gpu(args.gpu);
    if let Some(wall_time) = args.wall_time {
        config = config.with_wall_time(wall_time);
    }
    if let Some(memory) = args.memory {
        config = config.with_memory(memory);
    }

    let runner = BsubRunner::new(config);
    if args.array {
        let submission = runner.run_batch(&commands).await?;
        println!("{}", submission);
    } else {
        for submission in runner.run(&commands).await? {
            println!("{}", submission);
        }
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let commands = load_commands(&args)?;
    if commands.is_empty() {
        return Err(RunnerError::EmptyQueue);
    }
    tracing::info!(commands = commands.len(), "commands loaded");

    let backend = match args.backend {
        Backend::Auto => {
            if is_lsf_host() {
                Backend::Batch
            } else if parse_hosts(&args.hosts).is_empty() {
                Backend::Local
            } else {
                Backend::Cluster
            }
        }
        ref other => other.clone(),
    };

    match backend {
        Backend::Local => run_local(&args, commands).await,
        Backend::Cluster => run_cluster(&args, commands).await,
        Backend::Batch => run_batch(&args, commands).await,
        Backend::Auto => unreachable!("auto resolved above"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Run(run_args) => run(run_args).await,
        Commands::Expand { sweep_file } => {
            let spec = load_sweep_file(&sweep_file)?;
            for command in make_commands(&spec)? {
                println!("{}", command);
            }
            Ok(())
        }
    }
}
