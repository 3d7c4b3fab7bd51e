//! Command Handler Module
//!
//! Takes parsed operations, turns them into typed [`Command`]s and executes
//! them against the store, producing the [`Reply`] to send back.
//!
//! ## Supported Commands
//!
//! - `GET key` - Read a key's value (`NOT FOUND` if absent)
//! - `SET key value` - Write a key (`OK`)
//! - `DELETE key` - Remove a key (`OK`)
//! - `KEYS regex` - List keys matching a regular expression, one per line
//! - `QUIT` - Say `Bye-bye` and close the connection
//!
//! A blank line is a valid request and produces no output.
//!
//! ## Failure Handling
//!
//! Execution never fails. Misuse becomes a one-line message from
//! [`CommandError`]; a store failure becomes `Internal Error: <reason>`.
//! Either way the connection stays open.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │  Operation  │───>│   Command   │───>│  dispatch() │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                         dyn KvStore         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::commands::command::Command;
use crate::protocol::{Operation, Reply};
use crate::storage::{KvStore, StoreError};
use bytes::Bytes;
use regex::bytes::Regex;
use std::sync::Arc;
use tracing::{trace, warn};

/// Executes commands against a shared store.
///
/// Cloning is cheap; every connection gets its own clone.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    /// The store
    store: Arc<dyn KvStore>,
}

impl CommandHandler {
    /// Creates a new command handler over the given store.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Returns the store this handler executes against.
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Executes a parsed operation and returns the reply.
    pub fn execute(&self, op: Operation) -> Reply {
        match Command::from_operation(op) {
            Ok(command) => self.dispatch(command),
            Err(e) => {
                trace!(error = %e, "Rejected operation");
                Reply::error(e.to_string())
            }
        }
    }

    /// Dispatches a command to its handler.
    pub fn dispatch(&self, command: Command) -> Reply {
        match command {
            Command::Get { key } => self.cmd_get(&key),
            Command::Set { key, value } => self.cmd_set(key, value),
            Command::Delete { key } => self.cmd_delete(&key),
            Command::Keys { pattern } => self.cmd_keys(&pattern),
            Command::Quit => Reply::Bye,
            Command::Empty => Reply::Empty,
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// GET key
    fn cmd_get(&self, key: &Bytes) -> Reply {
        match self.store.get(key) {
            Ok(Some(value)) => Reply::Value(value),
            Ok(None) => Reply::NotFound,
            Err(e) => internal_error("GET", e),
        }
    }

    /// SET key value
    fn cmd_set(&self, key: Bytes, value: Bytes) -> Reply {
        match self.store.set(key, value) {
            Ok(()) => Reply::Ok,
            Err(e) => internal_error("SET", e),
        }
    }

    /// DELETE key
    fn cmd_delete(&self, key: &Bytes) -> Reply {
        match self.store.delete(key) {
            Ok(()) => Reply::Ok,
            Err(e) => internal_error("DELETE", e),
        }
    }

    /// KEYS regex
    ///
    /// Keys matched before a scan failure are still returned, followed by
    /// the error line.
    fn cmd_keys(&self, pattern: &Regex) -> Reply {
        let mut keys = Vec::new();

        for item in self.store.scan(false) {
            match item {
                Ok(item) if pattern.is_match(&item.key) => keys.push(item.key),
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, matched = keys.len(), "Key scan failed");
                    return Reply::Keys {
                        keys,
                        error: Some(internal_error_line(&e)),
                    };
                }
            }
        }

        Reply::keys(keys)
    }
}

fn internal_error_line(e: &StoreError) -> String {
    format!("Internal Error: {}", e)
}

fn internal_error(op: &'static str, e: StoreError) -> Reply {
    warn!(command = op, error = %e, "Store operation failed");
    Reply::error(internal_error_line(&e))
}
