//! linekv - A Line-Oriented Key-Value Server
//!
//! This is the main entry point for the linekv server.
//! It opens the store, binds the TCP listener, and serves until a
//! termination signal arrives.

use anyhow::Context;
use clap::Parser;
use linekv::commands::CommandHandler;
use linekv::config::Config;
use linekv::server::Server;
use linekv::storage::{DiskStore, Durability, JournalFlusher, KvStore, MemoryStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

fn print_banner(config: &Config, address: &str) {
    let storage = if config.in_memory {
        "in-memory".to_string()
    } else {
        format!("{} ({})", config.path.display(), config.durability())
    };

    println!(
        r#"
linekv v{} - Line-Oriented Key-Value Server
──────────────────────────────────────────────
Store:     {}
Listening: {}

Use Ctrl+C or SIGTERM to shut down gracefully.
"#,
        linekv::VERSION,
        storage,
        address
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::parse();

    // Set up logging
    init_tracing(&config.log_level);

    // Open the store
    let (store, flusher): (Arc<dyn KvStore>, Option<JournalFlusher>) = if config.in_memory {
        info!("Using in-memory store");
        (Arc::new(MemoryStore::new()), None)
    } else {
        let disk = DiskStore::open(&config.path, config.durability()).with_context(|| {
            format!("unable to open KV store [{}]", config.path.display())
        })?;
        let store: Arc<dyn KvStore> = Arc::new(disk);

        let flusher = match config.durability() {
            Durability::Buffered => Some(JournalFlusher::start(
                Arc::clone(&store),
                config.flusher(),
            )),
            Durability::Sync => None,
        };
        (store, flusher)
    };

    // Bind the TCP listener
    let address = config.bind_address();
    let server = Server::bind(address.as_str(), CommandHandler::new(Arc::clone(&store)))
        .await
        .with_context(|| format!("failed to listen on [{}]", config.address))?
        .with_drain_timeout(config.drain_timeout());
    let local = server.local_addr()?;
    info!(address = %local, "Listening");

    print_banner(&config, &local.to_string());

    // Serve until SIGINT/SIGTERM, then drain
    let report = server.run().await;

    if let Some(flusher) = flusher {
        flusher.stop();
    }
    store.flush().context("final flush of KV store failed")?;

    info!(
        connections = report.connections_accepted,
        commands = report.commands_processed,
        abandoned = report.abandoned,
        "Done"
    );
    Ok(())
}
