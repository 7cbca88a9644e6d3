//! Bot administration commands.
//!
//! All of these are restricted: quit, reload, join/part, nick change,
//! and loading a single plugin at runtime. Unauthorized callers get no
//! reply at all.

use async_trait::async_trait;
use tracing::info;

use super::{Context, Handler, HandlerError};

pub struct AdminCommands;

#[async_trait]
impl Handler for AdminCommands {
    fn restricted_commands(&self) -> Vec<String> {
        ["quit", "reload", "join", "part", "nick", "load"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    async fn reply(
        &self,
        ctx: &Context<'_>,
        command: &str,
        argument: &str,
    ) -> Result<Option<String>, HandlerError> {
        if !ctx.is_authorized() {
            return Ok(None);
        }

        let reply = match command {
            "quit" => {
                info!(by = %ctx.caller.nick, "shutdown requested");
                ctx.bot.outbound.quit("Leaving!");
                ctx.bot.shutdown.cancel();
                None
            }
            "reload" => {
                ctx.bot.registry.reload_all();
                Some("Reloaded commands.".to_string())
            }
            "join" => {
                ctx.bot.outbound.join(argument);
                None
            }
            "part" => {
                ctx.bot.outbound.part(argument);
                None
            }
            "nick" => {
                ctx.bot.outbound.nick(argument);
                None
            }
            "load" => match ctx.bot.registry.register(argument) {
                Ok(added) if !added.is_empty() => {
                    let names: Vec<&str> = added.iter().map(String::as_str).collect();
                    Some(format!(
                        "Loaded the {} plugin with the following commands: {}",
                        argument,
                        names.join(", ")
                    ))
                }
                _ => Some(
                    "Something went wrong; either you specified an unknown plugin \
                     or the plugin was already loaded."
                        .to_string(),
                ),
            },
            _ => None,
        };

        Ok(reply)
    }
}
