/*!
Error kinds produced by the parser.

Every error is fatal to the current parse: there is no partial tape returned
on failure (see the concurrency writeup in [`crate::pipeline`]).
*/

use thiserror::Error;

/// A JSON parsing or serialization failure.
///
/// Parsing never panics on malformed input; it returns one of these variants
/// instead. `NumberOverflow` is deliberately *not* a variant here, because
/// per spec it isn't fatal: an integer that doesn't fit in a `u64` is
/// silently converted to a `double` and the overflowed-integer flag is set
/// on the tape word instead (see [`crate::tape`]).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("invalid syntax at byte offset {offset}")]
    InvalidSyntax { offset: usize },

    #[error("unterminated string starting at byte offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid escape sequence at byte offset {offset}")]
    InvalidEscape { offset: usize },

    #[error("control character 0x{byte:02x} inside string at byte offset {offset}")]
    ControlCharacterInString { offset: usize, byte: u8 },

    #[error("number at byte offset {offset} does not match JSON number grammar")]
    NumberSyntax { offset: usize },

    #[error("container nesting exceeded the configured max depth ({max_depth})")]
    DepthExceeded { max_depth: usize },

    #[error("unbalanced containers: {open} container(s) still open at end of input")]
    UnbalancedContainers { open: usize },

    #[error("this CPU does not support the SIMD baseline this parser requires")]
    UnsupportedCpu,

    #[error("serialized document is truncated or corrupt: {reason}")]
    CorruptSerialization { reason: &'static str },

    #[error("serialized document has unsupported version byte {version}")]
    UnsupportedVersion { version: u8 },

    #[error("input is not valid UTF-8")]
    InvalidUtf8,

    #[error("cannot replace a {old_words}-word tape value with a {new_words}-word one in place")]
    CannotGrowValueInPlace { old_words: usize, new_words: usize },

    #[error("I/O error reading NDJSON stream: {message}")]
    Io { message: String },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io { message: err.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
