//! overdue - a deadline-triggered task engine.
//!
//! Usage:
//!   ovd run <watch-file>      Run the engine with watches from the file
//!   ovd validate <watch-file> Validate a watch file without running
//!   ovd list <watch-file>     List all watches in the file

use clap::{Parser, Subcommand};
use overdue::{
    load_watch_file, Engine, EngineError, Event, EventBus, EventHandler, FileStore, Store,
    StoreConfig, WebhookContract,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// ovd - a deadline-triggered task engine
#[derive(Parser)]
#[command(name = "ovd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine with watches from a file
    Run {
        /// Path to the YAML watch file
        #[arg(value_name = "WATCH_FILE")]
        watch_file: PathBuf,

        /// Override the configured worker count
        #[arg(short = 'w', long)]
        workers: Option<usize>,

        /// Override the configured heartbeat in milliseconds
        #[arg(long)]
        heartbeat_ms: Option<u64>,
    },

    /// Validate a watch file without running
    Validate {
        /// Path to the YAML watch file
        #[arg(value_name = "WATCH_FILE")]
        watch_file: PathBuf,
    },

    /// List all watches in the file
    List {
        /// Path to the YAML watch file
        #[arg(value_name = "WATCH_FILE")]
        watch_file: PathBuf,
    },
}

/// Simple logging event handler that prints contract lifecycle events.
struct LoggingHandler;

#[async_trait::async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) {
        match event {
            Event::ContractEnqueued { id, deadline, .. } => {
                info!("Watch '{}' enqueued (expires {})", id, deadline);
            }
            Event::ContractDispatched { id, worker, .. } => {
                info!("Watch '{}' picked up by worker {}", id, worker);
            }
            Event::ContractFired {
                id, action_failed, ..
            } => {
                if *action_failed {
                    error!("Watch '{}' expired but its callback failed", id);
                } else {
                    info!("Watch '{}' expired, callback delivered", id);
                }
            }
            Event::ContractPruned { id, .. } => {
                info!("Watch '{}' pruned", id);
            }
            Event::ContractDropped { id, .. } => {
                info!("Watch '{}' pruned before dispatch", id);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            watch_file,
            workers,
            heartbeat_ms,
        } => {
            run_engine(watch_file, workers, heartbeat_ms).await?;
        }
        Commands::Validate { watch_file } => {
            validate_watches(watch_file)?;
        }
        Commands::List { watch_file } => {
            list_watches(watch_file)?;
        }
    }

    Ok(())
}

/// Run the engine with watches from a file until interrupted.
async fn run_engine(
    watch_file: PathBuf,
    workers: Option<usize>,
    heartbeat_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading watches from: {}", watch_file.display());

    let file = load_watch_file(&watch_file)?;

    let mut config = file.engine.engine_config();
    if let Some(workers) = workers {
        config.workers = workers;
    }
    if let Some(heartbeat_ms) = heartbeat_ms {
        config.heartbeat = std::time::Duration::from_millis(heartbeat_ms);
    }

    let store: Option<Arc<dyn Store<WebhookContract>>> = match &file.store {
        StoreConfig::None => None,
        StoreConfig::File { path } => {
            info!("Persisting contracts to: {}", path);
            Some(Arc::new(FileStore::new(path)))
        }
    };

    let event_bus = EventBus::new();
    event_bus.register(Arc::new(LoggingHandler)).await;

    let engine = Engine::new(config, store).await?.with_event_bus(event_bus);
    engine.start().await?;

    let client = reqwest::Client::new();
    for watch in &file.watches {
        let contract = WebhookContract::from_config(watch, client.clone());
        match engine.enqueue(contract).await {
            Ok(()) => {}
            // recovered from the store on startup
            Err(EngineError::DuplicateContract(id)) => {
                info!("Watch '{}' already tracked, skipping", id);
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        "Engine running with {} watch(es); press Ctrl-C to stop",
        engine.active_count().await?
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    engine.shutdown().await?;

    Ok(())
}

/// Validate a watch file without running the engine.
fn validate_watches(watch_file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match load_watch_file(&watch_file) {
        Ok(file) => {
            info!(
                "{} is valid: {} watch(es), {} worker(s), heartbeat {}ms",
                watch_file.display(),
                file.watches.len(),
                file.engine.workers,
                file.engine.heartbeat_ms
            );
            Ok(())
        }
        Err(e) => {
            error!("{} is invalid: {}", watch_file.display(), e);
            Err(e.into())
        }
    }
}

/// List the watches defined in a file.
fn list_watches(watch_file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let file = load_watch_file(&watch_file)?;

    if file.watches.is_empty() {
        warn!("No watches defined in {}", watch_file.display());
        return Ok(());
    }

    for watch in &file.watches {
        let expired = if chrono::Utc::now() >= watch.expires_at {
            " (already expired)"
        } else {
            ""
        };
        info!(
            "  - {}: {} {} at {}{}",
            watch.id, watch.method, watch.url, watch.expires_at, expired
        );
    }

    Ok(())
}
