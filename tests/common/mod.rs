//! Integration test fixtures.
//!
//! Builds a bot with the real plugin registry wired to temp-dir data
//! files and an outbound queue we can drain and assert on.

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;

use emberbot::commands::registry::Registry;
use emberbot::commands::PluginDeps;
use emberbot::config::Config;
use emberbot::dispatch::Dispatcher;
use emberbot::sendq::Outbound;
use emberbot::state::BotState;

/// A dispatcher over the real plugin set, with captured outbound lines.
pub struct TestBot {
    pub state: Arc<BotState>,
    pub dispatcher: Dispatcher,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    _dir: TempDir,
}

impl TestBot {
    /// A bot with an empty factoid store. `admin.example` is the only
    /// privileged host.
    pub fn new() -> Self {
        Self::with_factoids("")
    }

    /// A bot whose factoid store starts with the given file content
    /// (name-line / hostmask-line / text-line triples).
    pub fn with_factoids(factoids: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let factoid_path = dir.path().join("factoids.txt");
        std::fs::write(&factoid_path, factoids).expect("seed factoids");

        let config = Config::parse(&format!(
            r#"
            [[server]]
            host = "irc.test.example"
            nick = "ember"
            privileged = ["admin.example"]

            [factoid]
            path = "{}"
            "#,
            factoid_path.display()
        ))
        .expect("test config");
        let server = config.servers[0].clone();

        let (outbound, outbound_rx) = Outbound::channel();
        let registry = Arc::new(Registry::new(PluginDeps::from_config(&config)));
        registry.reload_all();

        let state = Arc::new(BotState::new(&server, &config, outbound, registry));
        let dispatcher = Dispatcher::new(Arc::clone(&state));

        Self {
            state,
            dispatcher,
            outbound_rx,
            _dir: dir,
        }
    }

    /// Deliver a channel message from `nick` (host `<nick>.example`, so
    /// the nick `admin` is privileged).
    pub async fn say(&mut self, nick: &str, text: &str) {
        let host = format!("{nick}.example");
        self.dispatcher
            .handle_message("#ember", nick, nick, &host, text)
            .await;
    }

    /// Deliver a private message from `nick`.
    pub async fn whisper(&mut self, nick: &str, text: &str) {
        let host = format!("{nick}.example");
        self.dispatcher
            .handle_private_message(nick, nick, &host, text)
            .await;
    }

    /// Everything enqueued since the last drain.
    pub fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.outbound_rx.try_recv() {
            lines.push(line);
        }
        lines
    }
}
