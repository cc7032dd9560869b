//! arxiv-digest CLI
//!
//! One invocation performs one run; scheduling is left to cron or CI.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use arxiv_digest::{
    error::Result,
    models::Config,
    pipeline::{self, RunOptions},
    services::ArxivSource,
    storage::{CacheData, LocalCache, LocalStorage, PaperCache},
};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

/// arxiv-digest - Weekly arXiv reading digest
#[derive(Parser, Debug)]
#[command(
    name = "arxiv-digest",
    version,
    about = "Ranks the week's arXiv papers against an interest profile"
)]
struct Cli {
    /// Path to storage directory containing config.toml and the cache
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, rank and write this week's digest
    Run {
        /// Run as of this date (YYYY-MM-DD) instead of today
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Rank and render without writing the artifact or the cache
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Show configuration and cache status
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load, override from the environment and validate.
fn load_config(storage_dir: &Path) -> Result<Config> {
    let config_path = storage_dir.join("config.toml");
    let config = Config::load(&config_path)?.with_env_overrides();
    config.validate()?;
    log::info!("Loaded configuration from {}", config_path.display());
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run { date, dry_run } => {
            let config = load_config(&cli.storage_dir)?;
            let source = ArxivSource::new(&config.source)?;
            let options = RunOptions {
                today: date.unwrap_or_else(|| Utc::now().date_naive()),
                dry_run,
            };

            let summary = if config.cache.enabled {
                let storage = LocalStorage::new(&cli.storage_dir);
                let cache = LocalCache::open(storage, config.cache.file.as_str()).await;
                pipeline::run_digest(&config, &source, Some(&cache as &dyn PaperCache), options).await?
            } else {
                pipeline::run_digest(&config, &source, None, options).await?
            };

            println!("{}", serde_json::to_string_pretty(&summary)?);
            log::info!("Run complete: {} papers listed", summary.listed);
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            let config = load_config(&cli.storage_dir)?;
            let profile = &config.profile;

            log::info!("✓ Config OK");
            log::info!("    Category: {}", config.source.category);
            log::info!("    User-Agent: {}", config.source.user_agent()?);
            log::info!(
                "    Profile: {} keywords, {} authors, {} categories, {} exclusions",
                profile.keywords.len(),
                profile.authors.len(),
                profile.categories.len(),
                profile.exclude.len()
            );
            log::info!(
                "    Lookback {} days, threshold {}, top {}",
                profile.lookback_days,
                profile.threshold,
                profile.detailed_limit()
            );
            log::info!("    Theorem triggers: {}", config.extraction.patterns.len());
        }

        Command::Info => {
            let config = load_config(&cli.storage_dir)?;
            let today = Utc::now().date_naive();
            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!(
                "Next artifact: {}",
                Path::new(&config.output.dir)
                    .join(config.output.file_name(today))
                    .display()
            );

            if !config.cache.enabled {
                log::info!("Cache disabled.");
                return Ok(());
            }
            let storage = LocalStorage::new(&cli.storage_dir);
            match storage.read_json::<CacheData>(&config.cache.file).await {
                Ok(Some(data)) => {
                    log::info!("Cached papers: {}", data.count);
                    log::info!("Last updated: {}", data.updated_at);
                    if let Some(coverage) = data.coverage {
                        log::info!("Complete from {} to {}", coverage.since, coverage.until);
                    }
                }
                Ok(None) => log::info!("No cache found yet."),
                Err(e) => log::warn!("Cache unreadable: {}", e),
            }
        }
    }

    Ok(())
}

/// Main entry point for the CLI application.
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Cannot start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
