//! Protocol error types.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors arising from transport I/O or message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A line exceeded the maximum permitted length.
    #[error("message too long: {actual} bytes exceeds the {limit} byte limit")]
    MessageTooLong {
        /// Actual line length in bytes.
        actual: usize,
        /// The configured limit.
        limit: usize,
    },

    /// A received line was not valid UTF-8.
    #[error("invalid utf-8 at byte {byte_pos}: {details}")]
    InvalidUtf8 {
        /// Byte offset of the first invalid sequence.
        byte_pos: usize,
        /// Description from the UTF-8 decoder.
        details: String,
    },

    /// A line contained an illegal control character.
    #[error("illegal control character {0:?} in message")]
    IllegalControlChar(char),

    /// A line could not be parsed as an IRC message.
    #[error("invalid message {string:?}: {cause}")]
    InvalidMessage {
        /// The offending raw line.
        string: String,
        /// Why parsing failed.
        cause: MessageParseError,
    },
}

/// Errors arising while parsing a single message.
#[derive(Debug, Error)]
pub enum MessageParseError {
    /// The input was empty.
    #[error("empty message")]
    EmptyMessage,

    /// The prefix component was malformed.
    #[error("invalid prefix: {0:?}")]
    InvalidPrefix(String),

    /// The command component was malformed.
    #[error("invalid command: {0:?}")]
    InvalidCommand(String),

    /// Parsing failed at the given byte position.
    #[error("parse error at position {position}")]
    ParseFailure {
        /// Byte offset where the parser gave up.
        position: usize,
    },
}
