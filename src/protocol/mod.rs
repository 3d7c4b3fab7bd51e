//! Line Protocol Implementation
//!
//! This module implements the text protocol spoken by linekv clients.
//!
//! ## Overview
//!
//! Each request is one newline-terminated line: an operator followed by
//! whitespace-separated parameters, where a parameter containing spaces can
//! be wrapped in `'single'` or `"double"` quotes. Replies are plain lines.
//!
//! ## Modules
//!
//! - `tokenizer`: Splits a request line into an `Operation`
//! - `types`: Defines `Operation`, the `Reply` enum and its serialization
//!
//! ## Example
//!
//! ```
//! use linekv::protocol::{parse_line, Reply};
//!
//! let op = parse_line("set 'my key' \"my value\"");
//! assert_eq!(op.operator, "SET");
//! assert_eq!(op.params, vec!["my key", "my value"]);
//!
//! assert_eq!(Reply::Ok.serialize(), b"OK\n");
//! ```

pub mod tokenizer;
pub mod types;

// Re-export commonly used types for convenience
pub use tokenizer::{parse_line, tokenize, Tokens};
pub use types::{Operation, Reply};
