//! Inbound message dispatch.
//!
//! One dispatcher per server connection, driven by the session's read
//! loop. A message passes the flood guard, has its text recorded as the
//! sender's last line, and, when it starts with the command prefix, is
//! resolved through the registry and handed to a handler. Replies go to
//! the outbound queue, capped at four lines.

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, trace};

use crate::commands::{Caller, Context};
use crate::flood::FloodGuard;
use crate::state::BotState;

/// Reply lines forwarded per invocation; the rest are discarded.
const MAX_REPLY_LINES: usize = 4;

pub struct Dispatcher {
    state: Arc<BotState>,
    flood: FloodGuard,
}

impl Dispatcher {
    pub fn new(state: Arc<BotState>) -> Self {
        Self {
            state,
            flood: FloodGuard::new(),
        }
    }

    /// Handle a channel message.
    pub async fn handle_message(
        &mut self,
        channel: &str,
        nick: &str,
        login: &str,
        host: &str,
        text: &str,
    ) {
        let mask = format!("{login}@{host}");

        let exempt = self.state.flood_exempt_privileged && self.state.is_privileged(host);
        if !exempt && self.flood.should_ignore(&mask, text, Instant::now()) {
            trace!(mask = %mask, "flood guard dropped message");
            return;
        }

        self.state.last_lines.insert(mask, text.to_string());

        let mut chars = text.chars();
        if chars.next() != Some(self.state.prefix) {
            return;
        }
        let rest = chars.as_str();

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim_start()),
            None => (rest, ""),
        };

        let Some(handler) = self.state.registry.lookup(name) else {
            // Unknown commands are ignored, not rejected: other bots may
            // share the channel and the prefix.
            trace!(command = name, "unknown command");
            return;
        };

        debug!(command = name, nick, channel, "dispatching");

        let ctx = Context {
            caller: Caller { nick, login, host },
            channel,
            bot: &self.state,
        };

        match handler.reply(&ctx, name, argument).await {
            Ok(Some(reply)) => {
                for line in reply
                    .lines()
                    .take_while(|line| !line.is_empty())
                    .take(MAX_REPLY_LINES)
                {
                    self.state.outbound.privmsg(channel, line);
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!(command = name, error = %e, "handler failed");
            }
        }
    }

    /// Handle a private message: dispatched like a channel message with
    /// the sender's nick as the reply target.
    pub async fn handle_private_message(
        &mut self,
        nick: &str,
        login: &str,
        host: &str,
        text: &str,
    ) {
        self.handle_message(nick, nick, login, host, text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::registry::Registry;
    use crate::commands::{Handler, HandlerError, PluginDeps};
    use crate::config::Config;
    use crate::sendq::Outbound;
    use crate::state::BotState;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct EchoCommands;

    #[async_trait]
    impl Handler for EchoCommands {
        fn public_commands(&self) -> Vec<String> {
            vec!["echo".to_string()]
        }

        async fn reply(
            &self,
            _ctx: &Context<'_>,
            _command: &str,
            argument: &str,
        ) -> Result<Option<String>, HandlerError> {
            Ok(Some(argument.to_string()))
        }
    }

    struct FailingCommands;

    #[async_trait]
    impl Handler for FailingCommands {
        fn public_commands(&self) -> Vec<String> {
            vec!["broken".to_string()]
        }

        async fn reply(
            &self,
            _ctx: &Context<'_>,
            _command: &str,
            _argument: &str,
        ) -> Result<Option<String>, HandlerError> {
            Err(HandlerError::Internal("boom".to_string()))
        }
    }

    fn test_state() -> (Dispatcher, mpsc::UnboundedReceiver<String>) {
        let config = Config::parse(
            r#"
            [[server]]
            host = "irc.test.example"
            nick = "ember"
            privileged = ["admin.example"]
            "#,
        )
        .unwrap();
        let server = config.servers[0].clone();

        let (outbound, rx) = Outbound::channel();
        let registry = Arc::new(Registry::new(PluginDeps::from_config(&config)));
        let state = Arc::new(BotState::new(&server, &config, outbound, registry));
        (Dispatcher::new(state), rx)
    }

    fn install(dispatcher: &Dispatcher, handler: Arc<dyn Handler>) {
        dispatcher.state.registry.install_for_tests(handler);
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test(start_paused = true)]
    async fn non_prefixed_chat_produces_no_output() {
        let (mut dispatcher, mut rx) = test_state();
        install(&dispatcher, Arc::new(EchoCommands));

        dispatcher
            .handle_message("#chan", "alice", "alice", "host", "echo just chatting")
            .await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn prefixed_command_is_dispatched() {
        let (mut dispatcher, mut rx) = test_state();
        install(&dispatcher, Arc::new(EchoCommands));

        dispatcher
            .handle_message("#chan", "alice", "alice", "host", "-echo hello there")
            .await;
        assert_eq!(drain(&mut rx), ["PRIVMSG #chan :hello there"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_command_is_silently_dropped() {
        let (mut dispatcher, mut rx) = test_state();
        install(&dispatcher, Arc::new(EchoCommands));

        dispatcher
            .handle_message("#chan", "alice", "alice", "host", "-nosuchcmd")
            .await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reply_is_capped_at_four_lines() {
        let (mut dispatcher, mut rx) = test_state();
        install(&dispatcher, Arc::new(EchoCommands));

        dispatcher
            .handle_message("#chan", "alice", "alice", "host", "-echo a\nb\nc\nd\ne\nf")
            .await;
        let lines = drain(&mut rx);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "PRIVMSG #chan :d");
    }

    #[tokio::test(start_paused = true)]
    async fn reply_stops_at_first_empty_line() {
        let (mut dispatcher, mut rx) = test_state();
        install(&dispatcher, Arc::new(EchoCommands));

        dispatcher
            .handle_message("#chan", "alice", "alice", "host", "-echo a\nb\n\nc")
            .await;
        assert_eq!(lines_only(drain(&mut rx)), ["a", "b"]);
    }

    fn lines_only(lines: Vec<String>) -> Vec<String> {
        lines
            .into_iter()
            .map(|l| l.split(" :").nth(1).unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn failing_handler_is_swallowed() {
        let (mut dispatcher, mut rx) = test_state();
        install(&dispatcher, Arc::new(FailingCommands));

        dispatcher
            .handle_message("#chan", "alice", "alice", "host", "-broken")
            .await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_messages_are_suppressed() {
        let (mut dispatcher, mut rx) = test_state();
        install(&dispatcher, Arc::new(EchoCommands));

        dispatcher
            .handle_message("#chan", "alice", "alice", "host", "-echo hi")
            .await;
        dispatcher
            .handle_message("#chan", "alice", "alice", "host", "-echo hi")
            .await;
        // Only the first goes through; the repeat installed a mute.
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn last_line_is_recorded_for_translate() {
        let (mut dispatcher, _rx) = test_state();
        install(&dispatcher, Arc::new(EchoCommands));

        dispatcher
            .handle_message("#chan", "alice", "alice", "host", "ordinary chatter")
            .await;
        assert_eq!(
            dispatcher.state.last_line("alice@host").as_deref(),
            Some("ordinary chatter")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn private_messages_reply_to_the_sender() {
        let (mut dispatcher, mut rx) = test_state();
        install(&dispatcher, Arc::new(EchoCommands));

        dispatcher
            .handle_private_message("alice", "alice", "host", "-echo psst")
            .await;
        assert_eq!(drain(&mut rx), ["PRIVMSG alice :psst"]);
    }
}
