//! IRC commands and their wire serialization.
//!
//! Covers the verbs a client bot sends or inspects. Everything else is
//! preserved as [`Command::Raw`] so no inbound traffic is lost.

use std::fmt;

use crate::error::MessageParseError;

/// An IRC command with its parameters.
#[derive(Clone, PartialEq, Eq, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum Command {
    /// `NICK <nickname>`
    NICK(String),
    /// `USER <user> <mode> * <realname>`
    USER(String, String, String),
    /// `JOIN <channel> [key]`
    JOIN(String, Option<String>),
    /// `PART <channel> [message]`
    PART(String, Option<String>),
    /// `PRIVMSG <target> <text>`
    PRIVMSG(String, String),
    /// `NOTICE <target> <text>`
    NOTICE(String, String),
    /// `MODE <target> <modes>`
    MODE(String, String),
    /// `PING <server> [server2]`
    PING(String, Option<String>),
    /// `PONG <server> [server2]`
    PONG(String, Option<String>),
    /// `QUIT [message]`
    QUIT(Option<String>),
    /// `KICK <channel> <nick> [reason]`
    KICK(String, String, Option<String>),
    /// A numeric server reply with its arguments.
    Response(u16, Vec<String>),
    /// Any other command, preserved verbatim.
    Raw(String, Vec<String>),
}

impl Command {
    /// Build a command from its raw name and arguments.
    ///
    /// Three-digit names become [`Command::Response`]; unknown verbs
    /// become [`Command::Raw`].
    pub fn new(cmd: &str, args: Vec<&str>) -> Result<Command, MessageParseError> {
        if cmd.is_empty() {
            return Err(MessageParseError::InvalidCommand(cmd.to_owned()));
        }

        if cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit()) {
            let code = cmd.parse::<u16>().expect("three ascii digits parse as u16");
            return Ok(Command::Response(
                code,
                args.into_iter().map(String::from).collect(),
            ));
        }

        let owned = |s: &&str| (*s).to_owned();
        Ok(match (cmd.to_ascii_uppercase().as_str(), args.as_slice()) {
            ("NICK", [n]) => Command::NICK(owned(n)),
            ("USER", [u, m, _, r]) => Command::USER(owned(u), owned(m), owned(r)),
            ("JOIN", [c]) => Command::JOIN(owned(c), None),
            ("JOIN", [c, k]) => Command::JOIN(owned(c), Some(owned(k))),
            ("PART", [c]) => Command::PART(owned(c), None),
            ("PART", [c, m]) => Command::PART(owned(c), Some(owned(m))),
            ("PRIVMSG", [t, m]) => Command::PRIVMSG(owned(t), owned(m)),
            ("NOTICE", [t, m]) => Command::NOTICE(owned(t), owned(m)),
            ("MODE", [t, rest @ ..]) if !rest.is_empty() => {
                Command::MODE(owned(t), rest.join(" "))
            }
            ("PING", [s]) => Command::PING(owned(s), None),
            ("PING", [s, s2]) => Command::PING(owned(s), Some(owned(s2))),
            ("PONG", [s]) => Command::PONG(owned(s), None),
            ("PONG", [s, s2]) => Command::PONG(owned(s), Some(owned(s2))),
            ("QUIT", []) => Command::QUIT(None),
            ("QUIT", [m]) => Command::QUIT(Some(owned(m))),
            ("KICK", [c, n]) => Command::KICK(owned(c), owned(n), None),
            ("KICK", [c, n, r]) => Command::KICK(owned(c), owned(n), Some(owned(r))),
            _ => Command::Raw(
                cmd.to_owned(),
                args.into_iter().map(String::from).collect(),
            ),
        })
    }
}

/// Whether a parameter must be written as a `:`-prefixed trailing arg.
fn needs_colon(arg: &str) -> bool {
    arg.is_empty() || arg.starts_with(':') || arg.contains(' ')
}

/// Write `CMD arg1 arg2 … argN`, colon-prefixing the last arg only when
/// required by its content.
fn write_cmd(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    f.write_str(cmd)?;
    for (i, arg) in args.iter().enumerate() {
        let last = i == args.len() - 1;
        if last && needs_colon(arg) {
            write!(f, " :{arg}")?;
        } else {
            write!(f, " {arg}")?;
        }
    }
    Ok(())
}

/// Write `CMD arg1 … :last`, always colon-prefixing the final arg. Used
/// for free-form text parameters (PRIVMSG bodies, quit messages).
fn write_cmd_trailing(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    f.write_str(cmd)?;
    for (i, arg) in args.iter().enumerate() {
        if i == args.len() - 1 {
            write!(f, " :{arg}")?;
        } else {
            write!(f, " {arg}")?;
        }
    }
    Ok(())
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::NICK(n) => write_cmd(f, "NICK", &[n]),
            Command::USER(u, m, r) => write_cmd_trailing(f, "USER", &[u, m, "*", r]),
            Command::JOIN(c, Some(k)) => write_cmd(f, "JOIN", &[c, k]),
            Command::JOIN(c, None) => write_cmd(f, "JOIN", &[c]),
            Command::PART(c, Some(m)) => write_cmd_trailing(f, "PART", &[c, m]),
            Command::PART(c, None) => write_cmd(f, "PART", &[c]),
            Command::PRIVMSG(t, m) => write_cmd_trailing(f, "PRIVMSG", &[t, m]),
            Command::NOTICE(t, m) => write_cmd_trailing(f, "NOTICE", &[t, m]),
            Command::MODE(t, modes) => write_cmd(f, "MODE", &[t, modes]),
            Command::PING(s, Some(s2)) => write_cmd(f, "PING", &[s, s2]),
            Command::PING(s, None) => write_cmd(f, "PING", &[s]),
            Command::PONG(s, Some(s2)) => write_cmd(f, "PONG", &[s, s2]),
            Command::PONG(s, None) => write_cmd(f, "PONG", &[s]),
            Command::QUIT(Some(m)) => write_cmd_trailing(f, "QUIT", &[m]),
            Command::QUIT(None) => f.write_str("QUIT"),
            Command::KICK(c, n, Some(r)) => write_cmd_trailing(f, "KICK", &[c, n, r]),
            Command::KICK(c, n, None) => write_cmd(f, "KICK", &[c, n]),
            Command::Response(code, args) => {
                write!(f, "{code:03}")?;
                let refs: Vec<&str> = args.iter().map(String::as_str).collect();
                for (i, arg) in refs.iter().enumerate() {
                    let last = i == refs.len() - 1;
                    if last && needs_colon(arg) {
                        write!(f, " :{arg}")?;
                    } else {
                        write!(f, " {arg}")?;
                    }
                }
                Ok(())
            }
            Command::Raw(cmd, args) => {
                let refs: Vec<&str> = args.iter().map(String::as_str).collect();
                write_cmd(f, cmd, &refs)
            }
        }
    }
}
