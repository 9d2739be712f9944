//! PasteSync - Cross-device clipboard synchronization service
//!
//! This is the main entry point for the PasteSync daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pastesync::config::Config;
use pastesync::notify::LogNotifier;
use pastesync::store::{RecordStore, SqliteRecordStore};
use pastesync::sync::SyncEngine;
use pastesync::watcher::create_native_clipboard;

#[derive(Parser)]
#[command(name = "pastesync")]
#[command(about = "Cross-device clipboard synchronization service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the PasteSync daemon in the foreground")]
    Start,

    #[command(about = "Show device identity and store summary")]
    Status,

    #[command(about = "Show recent clipboard records")]
    History {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    #[command(about = "List known peers and their trust state")]
    Peers,

    #[command(about = "Show the effective configuration")]
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pastesync={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("PasteSync v{}", env!("CARGO_PKG_VERSION"));

    let config = match cli.config {
        Some(path) => Config::load_from_path(&path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Start => run_daemon(config).await,
        Commands::Status => show_status(config).await,
        Commands::History { limit } => show_history(config, limit).await,
        Commands::Peers => show_peers(config).await,
        Commands::Config => show_config(config),
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>> {
    std::fs::create_dir_all(&config.data_dir)?;
    let store = SqliteRecordStore::new(&config.database_path()).await?;
    Ok(Arc::new(store))
}

async fn run_daemon(config: Config) -> Result<()> {
    let store = open_store(&config).await?;
    let clipboard = create_native_clipboard()?;
    let engine = Arc::new(
        SyncEngine::new(&config, store, clipboard, Arc::new(LogNotifier)).await?,
    );

    engine.start()?;
    info!("PasteSync running on {} ({})", config.device_name, config.device_id);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    engine.stop();
    Ok(())
}

async fn show_status(config: Config) -> Result<()> {
    let store = open_store(&config).await?;
    let max_id = store.max_assigned_id().await?;
    let recent = store.recent(1).await?;

    let trust = pastesync::trust::TrustRegistry::new(config.trust_path());
    trust.load().await?;
    let peers = trust.connected_peers().await;

    println!("Device:    {} ({})", config.device_name, config.device_id);
    println!("Data dir:  {}", config.data_dir.display());
    println!("Listening: {}", config.listening_enabled);
    println!("Records:   {} assigned", max_id);
    match recent.first() {
        Some(record) => println!(
            "Latest:    #{} at {}",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("Latest:    none"),
    }
    println!("Peers:     {} connected", peers.len());
    Ok(())
}

async fn show_history(config: Config, limit: usize) -> Result<()> {
    let store = open_store(&config).await?;
    let records = store.recent(limit).await?;
    if records.is_empty() {
        println!("No clipboard records");
        return Ok(());
    }
    for record in records {
        let origin = if record.remote { "remote" } else { "local" };
        let app = record.source_app.as_deref().unwrap_or("unknown");
        println!(
            "#{:<6} {} {:>6}  {} item(s)  {} bytes  from {}",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            origin,
            record.items.len(),
            record.total_size(),
            app
        );
    }
    Ok(())
}

async fn show_peers(config: Config) -> Result<()> {
    let trust = pastesync::trust::TrustRegistry::new(config.trust_path());
    trust.load().await?;
    let peers = trust.connected_peers().await;
    if peers.is_empty() {
        println!("No connected peers");
        return Ok(());
    }
    for peer in peers {
        println!("{}  {}  {:?}", peer.peer_id, peer.name, peer.state);
    }
    Ok(())
}

fn show_config(config: Config) -> Result<()> {
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
