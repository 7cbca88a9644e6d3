//! # ember-proto
//!
//! A compact IRC protocol library for client-side use: owned message
//! types, a nom-based line parser, and a tokio TCP transport.
//!
//! ## Quick start
//!
//! ```rust
//! use ember_proto::Message;
//!
//! // Construct a message
//! let msg = Message::privmsg("#rust", "Hello, world!");
//! assert_eq!(msg.to_string(), "PRIVMSG #rust :Hello, world!\r\n");
//!
//! // Parse a message
//! let msg: Message = ":nick!user@host PRIVMSG #channel :Hi!".parse().unwrap();
//! assert_eq!(msg.source_nickname(), Some("nick"));
//! ```

#![warn(missing_docs)]

pub mod command;
pub mod error;
pub mod irc;
pub mod line;
pub mod message;
mod parser;
pub mod prefix;
pub mod transport;

pub use self::command::Command;
pub use self::error::{MessageParseError, ProtocolError};
pub use self::irc::IrcCodec;
pub use self::message::Message;
pub use self::prefix::Prefix;
pub use self::transport::{Transport, MAX_IRC_LINE_LEN};
