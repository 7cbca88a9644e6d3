//! emberbot - a small IRC utility bot.

use emberbot::config::Config;
use emberbot::session;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "emberbot.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if config.servers.is_empty() {
        anyhow::bail!("no usable [[server]] entries in {config_path}");
    }

    let mut bots = tokio::task::JoinSet::new();
    for server in config.servers.clone() {
        info!(
            server = %server.host,
            port = server.port,
            nick = %server.nick,
            "starting bot"
        );
        let config = config.clone();
        bots.spawn(session::run(server, config));
    }

    while bots.join_next().await.is_some() {}

    Ok(())
}
