//! shellcache admin CLI.
//!
//! Warms, inspects and prunes the cache stores the proxy serves from.
//! Results go to stdout as JSON; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use shellcache_client::{ControllerConfig, FetchClient, FetchConfig, ShellController};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(about = "Manage the offline shell cache")]
#[command(version)]
struct Args {
    /// Path to config file (default: $SHELLCACHE_CONFIG_FILE)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Cache the shell pages for the configured version and purge older stores
    Warm,
    /// List cache stores
    Stores,
    /// List entries of a store
    Entries {
        /// Store name (default: the configured version's store)
        #[arg(short, long)]
        store: Option<String>,
    },
    /// Delete every store except the configured version's
    Prune,
}

#[derive(Serialize)]
struct StoreSummary {
    name: String,
    entries: u64,
    current: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let args = Args::parse();

    let config_file = args
        .config
        .or_else(|| std::env::var_os("SHELLCACHE_CONFIG_FILE").map(PathBuf::from));
    let config = AppConfig::load_from(config_file.as_deref()).context("loading configuration")?;

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;

    match args.command {
        Command::Warm => warm(db, &config).await,
        Command::Stores => stores(&db, &config).await,
        Command::Entries { store } => entries(&db, &store.unwrap_or_else(|| config.store_name())).await,
        Command::Prune => prune(&db, &config).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn warm(db: CacheDb, config: &AppConfig) -> Result<()> {
    let origin = config.origin_url()?;
    let network = Arc::new(FetchClient::new(FetchConfig::from_app(config), origin)?);
    let controller = ShellController::new(db, network, ControllerConfig::from_app(config)?);

    let installed = controller.install().await.context("install")?;
    let activated = controller.activate().await.context("activate")?;

    print_json(&serde_json::json!({ "installed": installed, "activated": activated }))
}

async fn stores(db: &CacheDb, config: &AppConfig) -> Result<()> {
    let current = config.store_name();
    let mut summaries = Vec::new();
    for name in db.store_names().await? {
        let entries = db.store_handle(&name).len().await?;
        let is_current = name == current;
        summaries.push(StoreSummary { name, entries, current: is_current });
    }
    print_json(&summaries)
}

async fn entries(db: &CacheDb, store: &str) -> Result<()> {
    if !db.has_store(store).await? {
        anyhow::bail!("no such store: {store}");
    }
    print_json(&db.store_handle(store).entries().await?)
}

async fn prune(db: &CacheDb, config: &AppConfig) -> Result<()> {
    let keep = config.store_name();
    let purged = db.retain_only(&keep).await?;
    for name in &purged {
        tracing::info!(store = %name, "deleted stale store");
    }
    print_json(&serde_json::json!({ "kept": keep, "purged": purged }))
}
