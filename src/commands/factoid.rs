//! Stored text snippets ("factoids") with aliases.
//!
//! Each factoid is a set of names, the hostmask of its last editor, and
//! a text. Every stored name doubles as a public command returning the
//! text. The store lives in a plain text file of line triples:
//! space-separated names, editor hostmask, text.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::{Context, Handler, HandlerError, PluginError};

/// A single factoid.
#[derive(Debug, Clone)]
pub struct Factoid {
    names: BTreeSet<String>,
    host_mask: String,
    text: String,
}

impl Factoid {
    fn new(names: &[&str], host_mask: &str, text: &str) -> Self {
        Self {
            names: names.iter().map(|s| s.to_string()).collect(),
            host_mask: host_mask.to_string(),
            text: text.to_string(),
        }
    }

    fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    fn joined_names(&self) -> String {
        let names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        names.join(", ")
    }
}

pub struct FactoidCommands {
    path: PathBuf,
    store: RwLock<Vec<Factoid>>,
}

impl FactoidCommands {
    /// Load the store from disk. A missing file yields an empty store;
    /// a truncated trailing record is dropped with a warning.
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        let mut factoids = Vec::new();

        match std::fs::read_to_string(path) {
            Ok(content) => {
                let mut lines = content.lines();
                while let Some(names_line) = lines.next() {
                    if names_line.trim().is_empty() {
                        continue;
                    }
                    let (Some(host_mask), Some(text)) = (lines.next(), lines.next()) else {
                        warn!(path = %path.display(), "truncated factoid record, ignoring");
                        break;
                    };
                    let names: Vec<&str> = names_line.split_whitespace().collect();
                    factoids.push(Factoid::new(&names, host_mask, text));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "factoid file not found, starting empty");
            }
            Err(e) => return Err(PluginError::Io(e)),
        }

        Ok(Self {
            path: path.to_path_buf(),
            store: RwLock::new(factoids),
        })
    }

    /// Write the store back to disk.
    fn save(&self, factoids: &[Factoid]) -> Result<(), HandlerError> {
        let mut out = std::fs::File::create(&self.path)?;
        for f in factoids {
            let names: Vec<&str> = f.names.iter().map(String::as_str).collect();
            writeln!(out, "{}", names.join(" "))?;
            writeln!(out, "{}", f.host_mask)?;
            writeln!(out, "{}", f.text)?;
        }
        Ok(())
    }

    fn find_index(factoids: &[Factoid], name: &str) -> Option<usize> {
        factoids.iter().position(|f| f.has_name(name))
    }

    /// Render a factoid text, optionally addressed to a recipient. A
    /// leading `!` suppresses the addressed-reply casing.
    fn render(text: &str, recipient: &str) -> String {
        if recipient.is_empty() {
            match text.strip_prefix('!') {
                Some(rest) => rest.to_string(),
                None => text.to_string(),
            }
        } else {
            match text.strip_prefix('!') {
                Some(rest) => format!("{recipient}, {rest}"),
                None => {
                    let mut chars = text.chars();
                    let lowered = match chars.next() {
                        Some(first) => format!("{}{}", first.to_lowercase(), chars.as_str()),
                        None => String::new(),
                    };
                    format!("{recipient}, {lowered}")
                }
            }
        }
    }
}

#[async_trait]
impl Handler for FactoidCommands {
    fn public_commands(&self) -> Vec<String> {
        let mut commands: Vec<String> = [
            "factoid",
            "addfactoid",
            "updatefactoid",
            "removefactoid",
            "alias",
            "unalias",
            "aliases",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        for factoid in self.store.read().iter() {
            commands.extend(factoid.names.iter().cloned());
        }
        commands
    }

    fn restricted_commands(&self) -> Vec<String> {
        vec!["factoidhost".to_string()]
    }

    async fn reply(
        &self,
        ctx: &Context<'_>,
        command: &str,
        argument: &str,
    ) -> Result<Option<String>, HandlerError> {
        let nick = ctx.caller.nick;
        let prefix = ctx.bot.prefix;

        let reply = match command {
            "factoid" => {
                let store = self.store.read();
                match Self::find_index(&store, argument) {
                    Some(i) => Some(format!("{argument} is: {}", store[i].text)),
                    None => Some(format!("{nick}, that factoid was not found.")),
                }
            }

            "addfactoid" => {
                if !ctx.channel.starts_with('#') {
                    Some(format!("{nick}, this command only works in channels."))
                } else if let Some((name, text)) = argument.split_once(' ') {
                    let snapshot = ctx.bot.registry.snapshot();
                    if snapshot.public.contains(name) || snapshot.restricted.contains(name) {
                        Some(format!("{nick}, there is already a command with that name."))
                    } else {
                        let mut store = self.store.write();
                        if Self::find_index(&store, name).is_some() {
                            Some(format!(
                                "{nick}, a factoid with that name already exists; \
                                 use {prefix}updatefactoid to update this factoid."
                            ))
                        } else {
                            store.push(Factoid::new(&[name], &ctx.caller.full_mask(), text));
                            self.save(&store)?;
                            drop(store);
                            ctx.bot.registry.reload_all();
                            Some(format!("{prefix}{name} is now: {text}"))
                        }
                    }
                } else {
                    Some(format!("{nick}, you did not supply a factoid text."))
                }
            }

            "removefactoid" => {
                if !ctx.channel.starts_with('#') {
                    Some(format!("{nick}, this command only works in channels."))
                } else {
                    let mut store = self.store.write();
                    match Self::find_index(&store, argument) {
                        Some(i) if store[i].names.len() == 1 => {
                            store.remove(i);
                            self.save(&store)?;
                            drop(store);
                            ctx.bot.registry.reload_all();
                            Some(format!(
                                "The {prefix}{argument} factoid has been removed."
                            ))
                        }
                        Some(i) => Some(format!(
                            "For safety reasons, you are not allowed to remove factoids \
                             that have aliases. Please remove the aliases first if you \
                             wish to remove this factoid. All known aliases: {}",
                            store[i].joined_names()
                        )),
                        None => Some(format!("{nick}, that factoid does not exist.")),
                    }
                }
            }

            "updatefactoid" => {
                if !ctx.channel.starts_with('#') {
                    Some(format!("{nick}, this command only works in channels."))
                } else if let Some((name, text)) = argument.split_once(' ') {
                    let mut store = self.store.write();
                    match Self::find_index(&store, name) {
                        Some(i) => {
                            store[i].host_mask = ctx.caller.full_mask();
                            store[i].text = text.to_string();
                            self.save(&store)?;
                            drop(store);
                            ctx.bot.registry.reload_all();
                            Some(format!("{prefix}{name} is now: {text}"))
                        }
                        None => Some(format!(
                            "{nick}, a factoid with that name does not exist; \
                             use {prefix}addfactoid to create this factoid."
                        )),
                    }
                } else {
                    Some(format!("{nick}, you did not supply a factoid text."))
                }
            }

            "factoidhost" => {
                if ctx.is_authorized() {
                    let store = self.store.read();
                    let text = match Self::find_index(&store, argument) {
                        Some(i) => format!(
                            "The factoid {prefix}{argument} was last updated by: {}",
                            store[i].host_mask
                        ),
                        None => "That factoid does not exist.".to_string(),
                    };
                    drop(store);
                    // Answer privately so hostmasks stay out of channels.
                    ctx.bot.outbound.privmsg(nick, &text);
                }
                None
            }

            "alias" => {
                let names: Vec<&str> = argument.split_whitespace().collect();
                if names.len() != 2 {
                    Some("Please supply a current factoid and a new alias.".to_string())
                } else {
                    let (current, alias) = (names[0], names[1]);
                    let mut store = self.store.write();
                    match Self::find_index(&store, current) {
                        Some(i) => {
                            if Self::find_index(&store, alias).is_some_and(|j| j != i) {
                                Some(format!("A factoid called '{alias}' already exists."))
                            } else {
                                let snapshot = ctx.bot.registry.snapshot();
                                if (snapshot.public.contains(alias)
                                    || snapshot.restricted.contains(alias))
                                    && !store[i].has_name(alias)
                                {
                                    Some(format!("A command called '{alias}' already exists."))
                                } else if store[i].has_name(alias) {
                                    Some(format!(
                                        "The factoid '{current}' already has the alias '{alias}'."
                                    ))
                                } else {
                                    store[i].names.insert(alias.to_string());
                                    self.save(&store)?;
                                    let joined = store[i].joined_names();
                                    drop(store);
                                    ctx.bot.registry.reload_all();
                                    Some(format!(
                                        "Alias added. All commands for this factoid: {joined}"
                                    ))
                                }
                            }
                        }
                        None => Some(format!("Factoid '{current}' was not found.")),
                    }
                }
            }

            "unalias" => {
                let mut store = self.store.write();
                match Self::find_index(&store, argument) {
                    Some(i) if store[i].names.len() > 1 => {
                        let stored_name = store[i]
                            .names
                            .iter()
                            .find(|n| n.eq_ignore_ascii_case(argument))
                            .cloned();
                        if let Some(name) = stored_name {
                            store[i].names.remove(&name);
                        }
                        self.save(&store)?;
                        let joined = store[i].joined_names();
                        drop(store);
                        ctx.bot.registry.reload_all();
                        Some(format!(
                            "Alias removed. All commands for this factoid: {joined}"
                        ))
                    }
                    Some(_) => Some(format!(
                        "You cannot remove the last known alias for a factoid. If you \
                         really want to remove this factoid, use {prefix}removefactoid \
                         instead."
                    )),
                    None => Some(format!("Factoid '{argument}' was not found.")),
                }
            }

            "aliases" => {
                let name = match argument.strip_prefix(prefix) {
                    Some(rest) if !rest.is_empty() => rest,
                    _ => argument,
                };
                let store = self.store.read();
                match Self::find_index(&store, name) {
                    Some(i) => Some(format!(
                        "All known aliases for {prefix}{name}: {}",
                        store[i].joined_names()
                    )),
                    None => Some(format!("Factoid '{name}' was not found.")),
                }
            }

            // A stored factoid name used directly as a command.
            _ => {
                let store = self.store.read();
                Self::find_index(&store, command)
                    .map(|i| Self::render(&store[i].text, argument.trim()))
            }
        };

        Ok(reply)
    }
}
