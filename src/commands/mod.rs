//! Command handlers.
//!
//! Each plugin implements [`Handler`]: it declares the public and
//! restricted command names it owns and produces a reply for an
//! invocation. Handlers are registered through the
//! [`registry::Registry`], which enforces first-registrant-wins name
//! ownership and visibility.

pub mod admin;
pub mod api;
pub mod exec;
pub mod factoid;
pub mod help;
pub mod registry;
pub mod search;
pub mod translate;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ApiConfig, Config, ExecConfig, FactoidConfig, TranslateConfig};
use crate::state::BotState;

/// Errors surfaced by a command handler.
///
/// The dispatcher logs these and treats the invocation as "no reply";
/// one failing handler never takes down the dispatch loop.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Internal(String),
}

/// Errors constructing a plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("unknown plugin: {0}")]
    Unknown(String),
    #[error("plugin not configured: {0}")]
    NotConfigured(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid plugin data: {0}")]
    Data(String),
}

/// Identity of the user whose message is being handled.
#[derive(Debug, Clone)]
pub struct Caller<'a> {
    pub nick: &'a str,
    pub login: &'a str,
    pub host: &'a str,
}

impl Caller<'_> {
    /// The `login@host` mask used for flood and last-line tracking.
    pub fn mask(&self) -> String {
        format!("{}@{}", self.login, self.host)
    }

    /// The full `nick!login@host` mask recorded on factoids.
    pub fn full_mask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.login, self.host)
    }
}

/// Per-invocation context handed to a handler.
///
/// Built fresh for every dispatch, so caller identity can never leak
/// between invocations.
pub struct Context<'a> {
    /// Who sent the command.
    pub caller: Caller<'a>,
    /// Channel the command arrived in (the sender's nick for private
    /// messages).
    pub channel: &'a str,
    /// Shared bot state: outbound queue, registry, last lines.
    pub bot: &'a BotState,
}

impl Context<'_> {
    /// Whether the caller may run restricted commands.
    pub fn is_authorized(&self) -> bool {
        self.bot.is_privileged(self.caller.host)
    }
}

/// A command plugin.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Command names this handler serves publicly.
    fn public_commands(&self) -> Vec<String> {
        Vec::new()
    }

    /// Command names this handler serves for privileged users only.
    /// These are omitted from public help listings.
    fn restricted_commands(&self) -> Vec<String> {
        Vec::new()
    }

    /// Produce a reply for `command` with the given argument string.
    ///
    /// `Ok(None)` means no reply. Multi-line replies are truncated by
    /// the dispatcher.
    async fn reply(
        &self,
        ctx: &Context<'_>,
        command: &str,
        argument: &str,
    ) -> Result<Option<String>, HandlerError>;
}

/// Everything plugins need at construction time.
#[derive(Debug, Clone)]
pub struct PluginDeps {
    pub factoid: FactoidConfig,
    pub api: ApiConfig,
    pub translate: TranslateConfig,
    pub exec: Option<ExecConfig>,
}

impl PluginDeps {
    pub fn from_config(config: &Config) -> Self {
        Self {
            factoid: config.factoid.clone(),
            api: config.api.clone(),
            translate: config.translate.clone(),
            exec: config.exec.clone(),
        }
    }
}

/// The fixed built-in plugin list, registered in this order on reload.
pub const BUILTIN_PLUGINS: &[&str] = &[
    "admin",
    "api",
    "exec",
    "search",
    "factoid",
    "translate",
    "help",
];

/// Build a plugin by name.
pub fn build(name: &str, deps: &PluginDeps) -> Result<Arc<dyn Handler>, PluginError> {
    match name {
        "admin" => Ok(Arc::new(admin::AdminCommands)),
        "api" => Ok(Arc::new(api::ApiCommands::load(&deps.api.path)?)),
        "exec" => match &deps.exec {
            Some(config) => Ok(Arc::new(exec::ExecCommands::new(config.clone()))),
            None => Err(PluginError::NotConfigured("exec")),
        },
        "search" => Ok(Arc::new(search::SearchCommands)),
        "factoid" => Ok(Arc::new(factoid::FactoidCommands::load(
            &deps.factoid.path,
        )?)),
        "translate" => Ok(Arc::new(translate::TranslateCommands::new(
            deps.translate.clone(),
        ))),
        "help" => Ok(Arc::new(help::HelpCommands)),
        other => Err(PluginError::Unknown(other.to_string())),
    }
}
