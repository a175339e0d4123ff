//! # MarketPulse — action queue worker CLI
//!
//! Operator surface over the action queue:
//!   marketpulse run        # poll continuously, claim and execute
//!   marketpulse drain      # process everything eligible, then exit
//!   marketpulse recover    # reclaim orphaned leases and exit
//!   marketpulse health     # print a monitoring snapshot
//!   marketpulse add ...    # insert one action item by hand

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use marketpulse_core::PulseConfig;
use marketpulse_queue::{
    ActionHandler, ActionItem, ActionStore, ActionType, Dispatcher, HandlerRegistry, NewAction,
    Priority, RetryPolicy, SystemHealth, Worker,
};

#[derive(Parser)]
#[command(
    name = "marketpulse",
    version,
    about = "MarketPulse action queue — claim, execute, retry"
)]
struct Cli {
    /// Path to the action database (overrides config)
    #[arg(long)]
    db: Option<String>,

    /// Path to config.toml (default: ~/.marketpulse/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker loop continuously
    Run,
    /// Process all currently eligible actions, then exit
    Drain,
    /// Reclaim orphaned leases, then exit
    Recover,
    /// Print a health snapshot
    Health {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Insert one action item
    Add {
        /// Action type: research, data_fetch, news_scan, calculation, monitoring, code_task
        #[arg(long = "type")]
        action_type: String,
        /// Priority: critical, high, medium, low
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Short title
        #[arg(long)]
        title: String,
        /// Free-text description (scanned for a schedule date)
        #[arg(long)]
        description: String,
        /// Where this item came from
        #[arg(long)]
        source: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "marketpulse=debug,marketpulse_queue=debug"
    } else {
        "marketpulse=info,marketpulse_queue=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => PulseConfig::load_from(Path::new(&expand_path(path)))?,
        None => PulseConfig::load()?,
    };

    let db_path = expand_path(cli.db.as_deref().unwrap_or(&config.queue.db_path));
    let store = ActionStore::open(&PathBuf::from(&db_path))?;

    match cli.command {
        Command::Run => {
            let worker = build_worker(store, &config);
            tracing::info!("Database: {db_path}");
            worker
                .run(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }
        Command::Drain => {
            let worker = build_worker(store, &config);
            let processed = worker.drain().await?;
            println!("Processed {processed} action(s)");
        }
        Command::Recover => {
            let max_age = chrono::Duration::hours(config.queue.orphan_age_hours as i64);
            let reclaimed = store.reset_stuck(max_age, Utc::now())?;
            println!("Reclaimed {reclaimed} orphaned lease(s)");
        }
        Command::Health { json } => {
            let health = SystemHealth::gather(&store, Utc::now())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                print!("{health}");
            }
        }
        Command::Add {
            action_type,
            priority,
            title,
            description,
            source,
        } => {
            let action_type = ActionType::parse(&action_type)
                .ok_or_else(|| anyhow::anyhow!("unknown action type '{action_type}'"))?;
            let priority = Priority::parse(&priority)
                .ok_or_else(|| anyhow::anyhow!("unknown priority '{priority}'"))?;
            let mut new = NewAction::new(action_type, priority, &title, &description);
            if let Some(src) = source {
                new.source_context = Some(src);
            }
            let item = store.insert(&new, Utc::now())?;
            println!("Inserted {}", item.action_id);
            match item.scheduled_for {
                Some(at) => println!("Scheduled for {at}"),
                None => println!("Eligible immediately"),
            }
        }
    }

    Ok(())
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

fn build_worker(store: ActionStore, config: &PulseConfig) -> Worker {
    let policy = RetryPolicy {
        max_retries: config.queue.max_retries,
        ..Default::default()
    };
    Worker::new(
        store,
        Dispatcher::new(default_registry(), policy),
        &config.worker,
        &config.queue,
    )
}

/// Stand-in handlers so the binary runs end to end. The embedding
/// pipeline replaces these with real research/data/monitoring handlers.
fn default_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    for action_type in [
        ActionType::Research,
        ActionType::DataFetch,
        ActionType::NewsScan,
        ActionType::Calculation,
        ActionType::Monitoring,
        ActionType::CodeTask,
    ] {
        registry.register(action_type, Arc::new(EchoHandler));
    }
    registry
}

struct EchoHandler;

#[async_trait::async_trait]
impl ActionHandler for EchoHandler {
    async fn execute(&self, action: &ActionItem) -> std::result::Result<serde_json::Value, String> {
        tracing::info!(
            action_id = %action.action_id,
            "No pipeline handler attached; acknowledging '{}'",
            action.title
        );
        Ok(serde_json::json!({
            "handled_by": "echo",
            "title": action.title,
        }))
    }
}
