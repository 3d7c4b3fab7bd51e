//! Command Handler Module
//!
//! This module implements the command processing layer for linekv.
//! It receives parsed operations, validates them into typed commands,
//! executes them against the store, and returns the reply.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │   Tokenizer     │  (protocol module)
//! └────────┬────────┘
//!          │ Operation
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Validate     │
//! │  - Dispatch     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    KvStore      │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `GET`, `SET`, `DELETE`
//! - `KEYS`
//! - `QUIT`

pub mod command;
pub mod handler;

// Re-export the main command types
pub use command::{Command, CommandError};
pub use handler::CommandHandler;
