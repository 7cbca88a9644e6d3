//! Shared per-bot state.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::commands::registry::Registry;
use crate::config::{Config, ServerConfig};
use crate::sendq::Outbound;

/// State shared between the session loop, the dispatcher, and command
/// handlers for one server connection.
pub struct BotState {
    /// Server host, for log context.
    pub server: String,
    /// Command prefix character.
    pub prefix: char,
    /// Whether privileged users bypass the flood guard.
    pub flood_exempt_privileged: bool,
    /// Outbound queue handle.
    pub outbound: Outbound,
    /// Command registry.
    pub registry: Arc<Registry>,
    /// Last message per user mask, read by the translate handler.
    pub last_lines: DashMap<String, String>,
    /// Cancelled when an admin asks the bot to quit.
    pub shutdown: CancellationToken,
    /// Host names allowed to run restricted commands.
    privileged: Vec<String>,
    /// Current nickname; changes on NICK collisions and admin renames.
    nick: RwLock<String>,
}

impl BotState {
    pub fn new(
        server: &ServerConfig,
        config: &Config,
        outbound: Outbound,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            server: server.host.clone(),
            prefix: config.dispatch.prefix,
            flood_exempt_privileged: config.flood.exempt_privileged,
            outbound,
            registry,
            last_lines: DashMap::new(),
            shutdown: CancellationToken::new(),
            privileged: server.privileged.clone(),
            nick: RwLock::new(server.nick.clone()),
        }
    }

    /// Whether a host may run restricted commands.
    pub fn is_privileged(&self, host: &str) -> bool {
        self.privileged.iter().any(|h| h == host)
    }

    /// The bot's current nickname.
    pub fn nick(&self) -> String {
        self.nick.read().clone()
    }

    /// Record a nickname change.
    pub fn set_nick(&self, nick: &str) {
        *self.nick.write() = nick.to_string();
    }

    /// The last recorded message from a user mask.
    pub fn last_line(&self, mask: &str) -> Option<String> {
        self.last_lines.get(mask).map(|entry| entry.clone())
    }
}
