use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use beacon::{Engine, HistoryStore, MemoryHistory};
use clap::{Parser, Subcommand};
use history::{LibsqlHistory, RetentionCleanup, RetentionPolicy};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

mod config;
mod monitoring;
mod notify;
mod reload;

use config::Config;
use monitoring::CheckExecutor;
use reload::{ConfigWatcher, ReloadReason};

/// Results kept per target when no database is configured
const MEMORY_HISTORY_CAPACITY: usize = 1000;

#[derive(Debug, Parser)]
#[command(name = "beacon-service", version, about = "Uptime monitor with debounced alerts")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/beacon/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Monitor every configured target (default)
    Run,
    /// Check the config file and exit
    Validate,
    /// Print the effective configuration
    Show,
    /// Probe one target once and print the result
    Check { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init_tracing();

    let cli = Cli::parse();
    let path = config::resolve_path(cli.config.as_ref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(path).await,
        Command::Validate => validate(&path),
        Command::Show => {
            let config = Config::load_or_create(&path)?;
            println!("{config}");
            Ok(())
        }
        Command::Check { name } => check(&path, &name).await,
    }
}

async fn run(path: PathBuf) -> Result<()> {
    let mut config = Config::load_or_create(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    info!(path = %path.display(), "Loaded configuration");

    let registry = config.registry()?;
    let channels = notify::build_channels(&config.channels)?;
    let (store, cleanup) = open_history(&config).await?;
    let prober = Arc::new(CheckExecutor::new()?);

    let mut engine = Engine::new(prober, store, channels, config.engine_config());
    engine.start(registry).await?;

    let poll_every = Duration::from_secs(config.engine.reload_poll_seconds);
    let mut watcher = ConfigWatcher::new(path.clone(), poll_every)?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutdown requested");
                break;
            }
            reason = watcher.changed() => {
                config = reload(&mut engine, &path, config, reason).await;
            }
        }
    }

    engine.stop().await;
    if let Some(cleanup) = cleanup {
        cleanup.abort();
    }

    let stats = engine.stats();
    info!(
        checks = stats.checks,
        transitions = stats.transitions,
        deliveries = stats.deliveries,
        delivery_failures = stats.delivery_failures,
        "Beacon stopped"
    );
    Ok(())
}

/// Apply a changed config file. Anything invalid leaves the running
/// targets untouched.
async fn reload(engine: &mut Engine, path: &Path, current: Config, reason: ReloadReason) -> Config {
    info!(?reason, "Reloading configuration");

    let next = match Config::read(path) {
        Ok(next) => next,
        Err(e) => {
            error!(error = %e, "Config reload failed, keeping current targets");
            return current;
        }
    };

    let registry = match next.registry() {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "Invalid targets in reloaded config, keeping current targets");
            return current;
        }
    };

    if current.requires_restart(&next) {
        warn!("Engine, retry, database or channel settings changed; restart to apply them");
    }

    match engine.reload(registry).await {
        Ok(diff) if diff.is_empty() => info!("Targets unchanged"),
        Ok(diff) => info!(
            added = diff.added.len(),
            removed = diff.removed.len(),
            changed = diff.changed.len(),
            "Targets reloaded"
        ),
        Err(e) => {
            error!(error = %e, "Engine rejected reload, keeping current targets");
            return current;
        }
    }

    Config { defaults: next.defaults, targets: next.targets, ..current }
}

async fn open_history(config: &Config) -> Result<(Arc<dyn HistoryStore>, Option<JoinHandle<()>>)> {
    let Some(path) = &config.database.path else {
        warn!("No database configured, check history is kept in memory");
        return Ok((Arc::new(MemoryHistory::new(MEMORY_HISTORY_CAPACITY)), None));
    };

    let history = LibsqlHistory::open(path)
        .await
        .with_context(|| format!("failed to open history database {}", path.display()))?;
    info!(path = %path.display(), "Opened history database");

    let policy = RetentionPolicy::days(config.database.retention_days);
    let cleanup = RetentionCleanup::new(history.clone(), policy).start_periodic_cleanup();

    Ok((Arc::new(history), Some(cleanup)))
}

fn validate(path: &Path) -> Result<()> {
    let config = Config::read(path)?;
    let registry = config.registry()?;
    let channels = notify::build_channels(&config.channels)?;

    println!(
        "{}: OK ({} targets, {} channels)",
        path.display(),
        registry.len(),
        channels.len()
    );
    Ok(())
}

async fn check(path: &Path, name: &str) -> Result<()> {
    let config = Config::read(path)?;
    let registry = config.registry()?;
    let target = registry
        .get(&name.into())
        .ok_or_else(|| anyhow!("no target named {name} in {}", path.display()))?;

    let prober = CheckExecutor::new()?;
    let result = beacon::check_once(&prober, target).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.is_success() {
        bail!("check failed: {}", result.error.as_deref().unwrap_or("unknown error"));
    }
    Ok(())
}
