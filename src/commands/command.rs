//! Typed Commands
//!
//! Every request line is turned into one [`Command`] before anything touches
//! the store. Each variant carries exactly the parameters it needs, already
//! validated, so the execution side never re-checks argument counts.
//!
//! Parameters beyond the ones a command uses are ignored.

use crate::protocol::Operation;
use bytes::Bytes;
use regex::bytes::Regex;
use thiserror::Error;

/// A validated request.
#[derive(Debug, Clone)]
pub enum Command {
    /// `GET key`
    Get { key: Bytes },

    /// `SET key value`
    Set { key: Bytes, value: Bytes },

    /// `DELETE key`
    Delete { key: Bytes },

    /// `KEYS regex`
    Keys { pattern: Regex },

    /// `QUIT`
    Quit,

    /// A blank line
    Empty,
}

/// A request that could not be turned into a [`Command`].
///
/// The `Display` output of each variant is the exact line sent back to the
/// client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("GET need a key")]
    GetNeedsKey,

    #[error("SET need key and a value")]
    SetNeedsKeyAndValue,

    #[error("DELETE need a key")]
    DeleteNeedsKey,

    #[error("KEYS need a regex")]
    KeysNeedsRegex,

    #[error("Unable to compile regex: {0}")]
    InvalidRegex(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}

impl Command {
    /// Builds a command from a parsed operation.
    pub fn from_operation(op: Operation) -> Result<Self, CommandError> {
        let Operation { operator, params } = op;
        let mut params = params.into_iter();

        match operator.as_str() {
            "GET" => {
                let key = params.next().ok_or(CommandError::GetNeedsKey)?;
                Ok(Command::Get {
                    key: Bytes::from(key),
                })
            }
            "SET" => match (params.next(), params.next()) {
                (Some(key), Some(value)) => Ok(Command::Set {
                    key: Bytes::from(key),
                    value: Bytes::from(value),
                }),
                _ => Err(CommandError::SetNeedsKeyAndValue),
            },
            "DELETE" => {
                let key = params.next().ok_or(CommandError::DeleteNeedsKey)?;
                Ok(Command::Delete {
                    key: Bytes::from(key),
                })
            }
            "KEYS" => {
                let source = params.next().ok_or(CommandError::KeysNeedsRegex)?;
                let pattern = Regex::new(&source)
                    .map_err(|e| CommandError::InvalidRegex(single_line(&e.to_string())))?;
                Ok(Command::Keys { pattern })
            }
            "QUIT" => Ok(Command::Quit),
            "" => Ok(Command::Empty),
            _ => Err(CommandError::UnknownOperation(operator)),
        }
    }

    /// Returns the operator name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::Delete { .. } => "DELETE",
            Command::Keys { .. } => "KEYS",
            Command::Quit => "QUIT",
            Command::Empty => "",
        }
    }
}

/// Collapses a multi-line message onto one line.
///
/// Regex syntax errors render as a small ASCII diagram over several lines,
/// which would otherwise be read by the client as several replies.
fn single_line(msg: &str) -> String {
    msg.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
