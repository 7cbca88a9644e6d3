//! Translation link builder.
//!
//! Builds a Google Translate URL for the caller's recorded last line,
//! falling back to the argument when nothing is on record. The target
//! language can be overridden per channel.

use async_trait::async_trait;

use super::search::encode;
use super::{Context, Handler, HandlerError};
use crate::config::TranslateConfig;

pub struct TranslateCommands {
    config: TranslateConfig,
}

impl TranslateCommands {
    pub fn new(config: TranslateConfig) -> Self {
        Self { config }
    }

    fn language_for(&self, channel: &str) -> &str {
        self.config
            .channel_language
            .get(channel)
            .map(String::as_str)
            .unwrap_or(&self.config.default_language)
    }
}

#[async_trait]
impl Handler for TranslateCommands {
    fn public_commands(&self) -> Vec<String> {
        vec!["translate".to_string()]
    }

    async fn reply(
        &self,
        ctx: &Context<'_>,
        _command: &str,
        argument: &str,
    ) -> Result<Option<String>, HandlerError> {
        let language = self.language_for(ctx.channel);

        let text = ctx
            .bot
            .last_line(&ctx.caller.mask())
            .unwrap_or_else(|| argument.to_string());

        Ok(Some(format!(
            "http://translate.google.com/#auto%7c{language}%7c{}",
            encode(&text)
        )))
    }
}
