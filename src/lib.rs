//! # linekv - A Line-Oriented Key-Value Server
//!
//! linekv puts a plain-text TCP protocol in front of a key-value store.
//! Clients send one command per line and read back one or more reply lines;
//! any number of clients can be connected at once.
//!
//! ## Features
//!
//! - **Simple Protocol**: Newline-delimited text, usable from `nc` or `telnet`
//! - **Persistent**: Backed by an LSM keyspace on disk, with synced or
//!   buffered writes
//! - **Concurrent**: One Tokio task per connection
//! - **Graceful Shutdown**: SIGINT/SIGTERM stop new connections and wait for
//!   open ones to finish
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              linekv                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Server    │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Acceptor)  │    │  Handler    │    │  Handler    │                  │
//! │  └──────┬──────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │         │                  │                  │                         │
//! │         ▼                  ▼                  ▼                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────────────────────┐  │
//! │  │  Shutdown   │    │  Tokenizer  │    │      dyn KvStore            │  │
//! │  │ (flag+count)│    │             │    │  DiskStore | MemoryStore    │  │
//! │  └─────────────┘    └─────────────┘    └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use linekv::commands::CommandHandler;
//! use linekv::server::Server;
//! use linekv::storage::{DiskStore, Durability};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(DiskStore::open("/tmp/linekv", Durability::Sync)?);
//!     let server = Server::bind("127.0.0.1:36379", CommandHandler::new(store)).await?;
//!
//!     // Serves until SIGINT/SIGTERM, then waits for clients to leave
//!     let report = server.run().await;
//!     println!("served {} connections", report.connections_accepted);
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `GET key`
//! - `SET key value`
//! - `DELETE key`
//! - `KEYS regex`
//! - `QUIT`
//!
//! Keys and values containing spaces can be quoted: `SET 'my key' "my value"`.
//!
//! ## Module Overview
//!
//! - [`protocol`]: Line tokenizer, operations and replies
//! - [`storage`]: The store contract and its disk and memory implementations
//! - [`commands`]: Typed commands and their execution
//! - [`connection`]: Client connection management
//! - [`server`]: Accept loop and shutdown coordination
//! - [`config`]: Command-line configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{Command, CommandError, CommandHandler};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{parse_line, Operation, Reply};
pub use server::{Server, ServerError, Shutdown, ShutdownReport};
pub use storage::{
    DiskStore, Durability, FlusherConfig, JournalFlusher, KvItem, KvStore, MemoryStore, StoreError,
};

/// Version of linekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
