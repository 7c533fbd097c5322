//! jobmarket CLI
//!
//! Crawl a job board, export the raw postings and derive skill statistics.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand, ValueEnum};
use jobmarket::{
    error::{AppError, Result},
    models::{Config, CrawlMode, CrawlParams},
    pipeline,
    storage::LocalStore,
};

/// jobmarket - Job board crawler and skill-demand statistics
#[derive(Parser, Debug)]
#[command(
    name = "jobmarket",
    version,
    about = "Crawl job postings and derive skill demand statistics"
)]
struct Cli {
    /// Path to storage directory holding config, records and outputs
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ModeArg {
    Internships,
    Search,
}

/// Crawl controls shared by `crawl` and `pipeline`.
#[derive(clap::Args, Debug)]
struct CrawlArgs {
    /// Listing space to walk
    #[arg(long, value_enum, default_value_t = ModeArg::Internships)]
    mode: ModeArg,

    /// Search query (search mode)
    #[arg(short, long)]
    query: Option<String>,

    /// Maximum records to collect
    #[arg(short, long)]
    limit: Option<usize>,

    /// Show the browser window (script-rendered sites only)
    #[arg(long)]
    no_headless: bool,
}

impl CrawlArgs {
    fn into_params(self, config: &Config) -> Result<CrawlParams> {
        let mode = match (self.mode, self.query) {
            (ModeArg::Internships, None) => CrawlMode::Internships,
            (ModeArg::Internships, Some(_)) => {
                return Err(AppError::config("--query needs --mode search"));
            }
            (ModeArg::Search, Some(query)) if !query.trim().is_empty() => CrawlMode::Search {
                query: query.trim().to_string(),
            },
            (ModeArg::Search, _) => {
                return Err(AppError::config("--mode search needs a non-empty --query"));
            }
        };

        Ok(CrawlParams {
            mode,
            limit: self.limit,
            headless: config.site.headless && !self.no_headless,
        })
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl postings into the record store
    Crawl(CrawlArgs),

    /// Export stored postings to the raw CSV
    Export,

    /// Normalize the raw CSV, extract skills and aggregate
    Process,

    /// Run full pipeline: Crawl → Export → Process
    Pipeline(CrawlArgs),

    /// Validate configuration, rule tables and taxonomy
    Validate,

    /// Show record store info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Set the returned flag on Ctrl-C; a second Ctrl-C is left to the OS.
fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received; finishing the current record");
            flag.store(true, Ordering::SeqCst);
        }
    });
    cancel
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => {
            log::info!("Done!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    match cli.command {
        Command::Validate => pipeline::run_validate(&config, &cli.storage_dir),
        command => {
            config.validate()?;
            execute(command, &config, &cli.storage_dir).await
        }
    }
}

async fn execute(command: Command, config: &Config, storage_dir: &Path) -> Result<()> {
    let store = LocalStore::open(storage_dir).await?;

    match command {
        Command::Crawl(args) => {
            let params = args.into_params(config)?;
            pipeline::run_crawler(config, &store, &params, cancel_on_ctrl_c()).await?;
        }

        Command::Export => {
            let path = config.paths.resolve(storage_dir, &config.paths.raw_export);
            pipeline::run_export(&store, &path).await?;
        }

        Command::Process => {
            pipeline::run_process(config, storage_dir).await?;
        }

        Command::Pipeline(args) => {
            let params = args.into_params(config)?;
            pipeline::run_pipeline(config, storage_dir, &store, &params, cancel_on_ctrl_c()).await?;
        }

        Command::Info => {
            log::info!("Storage directory: {}", storage_dir.display());
            pipeline::run_info(&store).await?;
        }

        Command::Validate => pipeline::run_validate(config, storage_dir)?,
    }

    Ok(())
}
