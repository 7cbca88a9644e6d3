//! Owned IRC message type.

use std::fmt;
use std::str::FromStr;

use crate::command::Command;
use crate::error::{MessageParseError, ProtocolError};
use crate::parser::ParsedMessage;
use crate::prefix::Prefix;

/// An owned IRC message: optional prefix plus command and parameters.
///
/// # Example
///
/// ```
/// use ember_proto::Message;
///
/// let msg: Message = ":nick!user@host PRIVMSG #channel :Hello!".parse().unwrap();
/// let msg = Message::privmsg("#channel", "Hello!");
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct Message {
    /// Message origin (e.g. `nick!user@host`), absent on client-sent lines.
    pub prefix: Option<Prefix>,
    /// The IRC command and its parameters.
    pub command: Command,
}

impl Message {
    /// Create a message from raw components.
    pub fn new(
        prefix: Option<&str>,
        command: &str,
        args: Vec<&str>,
    ) -> Result<Message, MessageParseError> {
        Ok(Message {
            prefix: prefix.map(Prefix::new_from_str),
            command: Command::new(command, args)?,
        })
    }

    /// Get the nickname from the message prefix, if present.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }

    /// Get the appropriate target for a reply: the channel for channel
    /// messages, the sender's nick for private ones.
    pub fn response_target(&self) -> Option<&str> {
        match self.command {
            Command::PRIVMSG(ref target, _) | Command::NOTICE(ref target, _)
                if target.starts_with('#') || target.starts_with('&') =>
            {
                Some(target)
            }
            _ => self.source_nickname(),
        }
    }

    /// Create a PRIVMSG to a target.
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Command::PRIVMSG(target.into(), text.into()).into()
    }

    /// Create a NOTICE to a target.
    #[must_use]
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Command::NOTICE(target.into(), text.into()).into()
    }

    /// Create a JOIN for a channel.
    #[must_use]
    pub fn join(channel: impl Into<String>) -> Self {
        Command::JOIN(channel.into(), None).into()
    }

    /// Create a JOIN for a keyed channel.
    #[must_use]
    pub fn join_with_key(channel: impl Into<String>, key: impl Into<String>) -> Self {
        Command::JOIN(channel.into(), Some(key.into())).into()
    }

    /// Create a PART for a channel.
    #[must_use]
    pub fn part(channel: impl Into<String>) -> Self {
        Command::PART(channel.into(), None).into()
    }

    /// Create a NICK change.
    #[must_use]
    pub fn nick(nickname: impl Into<String>) -> Self {
        Command::NICK(nickname.into()).into()
    }

    /// Create a USER registration line.
    #[must_use]
    pub fn user(username: impl Into<String>, realname: impl Into<String>) -> Self {
        Command::USER(username.into(), "0".into(), realname.into()).into()
    }

    /// Create a PONG reply to a PING.
    #[must_use]
    pub fn pong(server: impl Into<String>) -> Self {
        Command::PONG(server.into(), None).into()
    }

    /// Create a QUIT with a message.
    #[must_use]
    pub fn quit_with_message(message: impl Into<String>) -> Self {
        Command::QUIT(Some(message.into())).into()
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message {
            prefix: None,
            command,
        }
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        if s.is_empty() {
            return Err(ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause: MessageParseError::EmptyMessage,
            });
        }

        let parsed = ParsedMessage::parse(s).map_err(|position| ProtocolError::InvalidMessage {
            string: s.to_owned(),
            cause: MessageParseError::ParseFailure { position },
        })?;

        Message::new(parsed.prefix, parsed.command, parsed.params.to_vec()).map_err(|cause| {
            ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause,
            }
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        write!(f, "{}\r\n", self.command)
    }
}
