//! Line Tokenizer
//!
//! Splits one request line into an [`Operation`]. Tokens are separated by
//! whitespace, except that a run delimited by a matching pair of `'` or `"`
//! quotes is kept together as a single token with the quotes removed.
//!
//! ## Token Rules
//!
//! At every position the tokenizer tries, in order:
//!
//! 1. `'...'` - a single quote followed by one or more non-`'` characters and
//!    a closing `'`. The token is the text in between.
//! 2. `"..."` - the same with double quotes.
//! 3. A run of non-whitespace characters. If the run starts with a quote, the
//!    leading quote is dropped, and then one trailing quote of the same kind
//!    is dropped if present.
//!
//! There are no escape sequences and quotes do not nest. Malformed quoting
//! never fails; it just produces the token boundaries above:
//!
//! ```text
//! SET 'my key' "my value"   ->  SET ["my key", "my value"]
//! GET 'unterminated         ->  GET ["unterminated"]
//! GET abc'                  ->  GET ["abc'"]
//! GET 'a'b                  ->  GET ["a", "b"]
//! ```

use crate::protocol::types::Operation;

/// Whitespace as understood by the protocol (space, `\t`, `\n`, `\f`, `\r`).
#[inline]
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\x0c' | b'\r')
}

#[inline]
fn is_quote(b: u8) -> bool {
    b == b'\'' || b == b'"'
}

/// Iterator over the tokens of a single line.
///
/// Quotes and whitespace are all ASCII, so every slice boundary lands on a
/// UTF-8 character boundary.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }

    /// Tries to read a fully quoted token starting at `start`.
    ///
    /// Returns the token and the position right after the closing quote.
    fn quoted(&self, start: usize) -> Option<(&'a str, usize)> {
        let bytes = self.line.as_bytes();
        let quote = bytes[start];
        let close = bytes[start + 1..].iter().position(|&b| b == quote)? + start + 1;

        // An empty pair ('' or "") is not a quoted token.
        if close == start + 1 {
            return None;
        }

        Some((&self.line[start + 1..close], close + 1))
    }

    /// Reads a bare token starting at `start`, stripping a leading quote and
    /// its matching trailing quote.
    fn bare(&self, start: usize) -> (&'a str, usize) {
        let bytes = self.line.as_bytes();
        let end = bytes[start..]
            .iter()
            .position(|&b| is_space(b))
            .map_or(bytes.len(), |offset| start + offset);

        let mut token = &self.line[start..end];
        if let Some(&first) = token.as_bytes().first() {
            if is_quote(first) {
                token = &token[1..];
                if token.as_bytes().last() == Some(&first) {
                    token = &token[..token.len() - 1];
                }
            }
        }

        (token, end)
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.line.as_bytes();

        while self.pos < bytes.len() && is_space(bytes[self.pos]) {
            self.pos += 1;
        }
        if self.pos >= bytes.len() {
            return None;
        }

        let start = self.pos;
        let quoted = if is_quote(bytes[start]) {
            self.quoted(start)
        } else {
            None
        };

        let (token, next) = quoted.unwrap_or_else(|| self.bare(start));
        self.pos = next;
        Some(token)
    }
}

/// Splits a line into its tokens.
pub fn tokenize(line: &str) -> Tokens<'_> {
    Tokens::new(line)
}

/// Parses one request line into an [`Operation`].
///
/// The first token, upper-cased, becomes the operator and the rest become
/// the parameters. An empty or blank line yields an operation with an empty
/// operator and no parameters.
pub fn parse_line(line: &str) -> Operation {
    let mut tokens = tokenize(line);

    let operator = match tokens.next() {
        Some(first) => first.to_uppercase(),
        None => return Operation::default(),
    };
    let params = tokens.map(str::to_string).collect();

    Operation { operator, params }
}
