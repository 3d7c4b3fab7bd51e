//! Connection Handler Module
//!
//! This module manages individual client connections to linekv.
//! Each client connection is handled by its own async task, allowing
//! the server to handle thousands of concurrent clients efficiently.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                 (server module)                             │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read line   │───>│  Tokenize   │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send resp   │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Async I/O**: Uses Tokio for non-blocking network operations
//! - **Line Buffering**: Buffered reader and writer per connection
//! - **Bounded Lines**: Requests longer than 64 KB end the connection
//! - **Statistics**: Tracks connection and command metrics
//!
//! ## Example
//!
//! ```ignore
//! use linekv::connection::{handle_connection, ConnectionStats};
//! use linekv::commands::CommandHandler;
//! use linekv::server::Shutdown;
//! use linekv::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! let handler = CommandHandler::new(Arc::new(MemoryStore::new()));
//! let stats = Arc::new(ConnectionStats::new());
//! let shutdown = Shutdown::new();
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! let guard = shutdown.register();
//! tokio::spawn(handle_connection(stream, addr, handler.clone(), stats.clone(), guard));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, Disconnect,
};
