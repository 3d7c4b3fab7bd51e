//! Server Configuration
//!
//! Command-line options for the `linekv` binary.

use crate::storage::{Durability, FlusherConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Default store directory
pub const DEFAULT_PATH: &str = "/var/lib/linekv";

/// Default bind address (all interfaces)
pub const DEFAULT_ADDRESS: &str = ":36379";

/// A line-oriented TCP front end for a persistent key-value store.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "linekv", author, version, about, long_about = None)]
pub struct Config {
    /// Path to the KV store directory. Created if missing.
    #[arg(long, default_value = DEFAULT_PATH)]
    pub path: PathBuf,

    /// Address to bind to, as host:port. A bare :port binds all interfaces.
    #[arg(long, default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Sync every write to disk before acknowledging it.
    #[arg(long)]
    pub sync: bool,

    /// How often buffered writes are flushed to disk, in milliseconds.
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub flush_interval_ms: u64,

    /// Give up waiting for open connections this many seconds after a
    /// shutdown signal. Waits indefinitely when unset.
    #[arg(long)]
    pub drain_timeout_secs: Option<u64>,

    /// Keep data in memory only; nothing is written to disk.
    #[arg(long)]
    pub in_memory: bool,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            address: DEFAULT_ADDRESS.to_string(),
            sync: false,
            flush_interval_ms: 1000,
            drain_timeout_secs: None,
            in_memory: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Returns the durability mode selected by `--sync`.
    pub fn durability(&self) -> Durability {
        if self.sync {
            Durability::Sync
        } else {
            Durability::Buffered
        }
    }

    /// Returns the bind address with the `:port` shorthand expanded.
    pub fn bind_address(&self) -> String {
        crate::server::normalize_address(&self.address)
    }

    /// Returns the flusher settings for buffered mode.
    pub fn flusher(&self) -> FlusherConfig {
        FlusherConfig {
            interval: Duration::from_millis(self.flush_interval_ms),
        }
    }

    /// Returns the drain bound, if any.
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_secs.map(Duration::from_secs)
    }
}
