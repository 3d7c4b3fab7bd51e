//! Protocol Data Types
//!
//! Requests and replies exchanged over the line protocol.
//!
//! ## Wire Format
//!
//! Every request is one line of UTF-8 text terminated by `\n`. Every reply is
//! zero or more lines, each terminated by `\n`:
//!
//! ```text
//! > SET name Ariz
//! < OK
//! > GET name
//! < Ariz
//! > GET missing
//! < NOT FOUND
//! > KEYS ^na
//! < name
//! > QUIT
//! < Bye-bye
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// The line terminator used by the protocol.
pub const LF: u8 = b'\n';

/// A parsed request line.
///
/// `operator` is always upper-case; an empty operator means the line was
/// blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operation {
    pub operator: String,
    pub params: Vec<String>,
}

impl Operation {
    /// Returns true for a blank line.
    pub fn is_empty(&self) -> bool {
        self.operator.is_empty()
    }

    /// Returns the parameter at `index`, if present.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

/// A reply to a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing is written (blank request line).
    Empty,

    /// A stored value, written as-is.
    Value(Bytes),

    /// `OK`
    Ok,

    /// `NOT FOUND`
    NotFound,

    /// Zero or more keys, one per line. An optional error line follows the
    /// keys when the scan failed part way through.
    Keys {
        keys: Vec<Bytes>,
        error: Option<String>,
    },

    /// A one-line message describing misuse or a store failure.
    Error(String),

    /// `Bye-bye`; the connection is closed after it is flushed.
    Bye,
}

impl Reply {
    /// Creates a value reply.
    pub fn value(data: impl Into<Bytes>) -> Self {
        Reply::Value(data.into())
    }

    /// Creates an error reply.
    pub fn error(msg: impl Into<String>) -> Self {
        Reply::Error(msg.into())
    }

    /// Creates a key listing with no trailing error.
    pub fn keys(keys: Vec<Bytes>) -> Self {
        Reply::Keys { keys, error: None }
    }

    /// Returns true if the connection must be closed after this reply.
    pub fn closes_connection(&self) -> bool {
        matches!(self, Reply::Bye)
    }

    /// Serializes the reply to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.serialize_into(&mut buf);
        buf.to_vec()
    }

    /// Appends the wire form of the reply to `buf`.
    pub fn serialize_into(&self, buf: &mut BytesMut) {
        match self {
            Reply::Empty => {}
            Reply::Value(data) => put_line(buf, data),
            Reply::Ok => put_line(buf, b"OK"),
            Reply::NotFound => put_line(buf, b"NOT FOUND"),
            Reply::Keys { keys, error } => {
                for key in keys {
                    put_line(buf, key);
                }
                if let Some(msg) = error {
                    put_line(buf, msg.as_bytes());
                }
            }
            Reply::Error(msg) => put_line(buf, msg.as_bytes()),
            Reply::Bye => put_line(buf, b"Bye-bye"),
        }
    }
}

#[inline]
fn put_line(buf: &mut BytesMut, line: &[u8]) {
    buf.reserve(line.len() + 1);
    buf.put_slice(line);
    buf.put_u8(LF);
}
