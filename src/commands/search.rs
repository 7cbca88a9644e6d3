//! Search-engine URL builders.

use async_trait::async_trait;
use url::form_urlencoded::byte_serialize;

use super::{Context, Handler, HandlerError};

pub struct SearchCommands;

/// Encode a query the way HTML forms do (spaces become `+`).
pub(crate) fn encode(query: &str) -> String {
    byte_serialize(query.as_bytes()).collect()
}

#[async_trait]
impl Handler for SearchCommands {
    fn public_commands(&self) -> Vec<String> {
        ["google", "lmgtfy", "wiki", "wikipedia"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    async fn reply(
        &self,
        _ctx: &Context<'_>,
        command: &str,
        argument: &str,
    ) -> Result<Option<String>, HandlerError> {
        let search = encode(argument);
        let reply = match command {
            "google" => Some(format!("http://www.google.com/search?q={search}")),
            "lmgtfy" => Some(format!("http://lmgtfy.com/?q={search}")),
            "wiki" | "wikipedia" => Some(format!(
                "http://en.wikipedia.org/wiki/Special:Search/{search}"
            )),
            _ => None,
        };
        Ok(reply)
    }
}
