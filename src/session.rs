//! Per-server connection lifecycle.
//!
//! Each configured server gets one session: a reconnect loop around
//! connect → register → event loop, a single send worker draining the
//! outbound queue, and a periodic task that (re)joins configured
//! channels. Disconnects are recovered with a fixed backoff, never
//! fatal.

use anyhow::{anyhow, Result};
use ember_proto::{Command, IrcCodec, Message, Prefix, Transport};
use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, Duration, Instant};
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use crate::commands::registry::Registry;
use crate::commands::PluginDeps;
use crate::config::{Config, ServerConfig};
use crate::dispatch::Dispatcher;
use crate::sendq::{send_worker, Outbound, WriteHalf};
use crate::state::BotState;
use crate::throttle::RateGate;

/// Backoff between reconnection attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// How often missing channels are rejoined.
const JOIN_INTERVAL: Duration = Duration::from_secs(10);

/// Limit on the registration handshake.
const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(60);

type ReadHalf = SplitStream<Framed<TcpStream, IrcCodec>>;

/// Channels the bot currently occupies, keyed case-insensitively.
type Joined = Arc<RwLock<HashSet<String>>>;

/// Run one bot until an admin asks it to quit.
pub async fn run(server: ServerConfig, config: Config) {
    let (outbound, lines_rx) = Outbound::channel();

    let registry = Arc::new(Registry::new(PluginDeps::from_config(&config)));
    registry.reload_all();

    let state = Arc::new(BotState::new(&server, &config, outbound.clone(), registry));

    let (sink_tx, sink_rx) = mpsc::channel::<WriteHalf>(4);
    let writer = tokio::spawn(send_worker(
        lines_rx,
        sink_rx,
        RateGate::new(Instant::now()),
    ));

    let mut dispatcher = Dispatcher::new(Arc::clone(&state));

    while !state.shutdown.is_cancelled() {
        match connect_once(&server, &state, &mut dispatcher, &sink_tx).await {
            Ok(()) => info!(server = %server.host, "disconnected"),
            Err(e) => warn!(server = %server.host, error = %e, "connection failed"),
        }

        if state.shutdown.is_cancelled() {
            break;
        }
        info!(server = %server.host, delay = ?RECONNECT_DELAY, "reconnecting");
        tokio::select! {
            _ = sleep(RECONNECT_DELAY) => {}
            _ = state.shutdown.cancelled() => break,
        }
    }

    // Close both producer sides so the writer drains what is queued
    // (the admin QUIT, typically) and exits.
    drop(sink_tx);
    drop(dispatcher);
    drop(state);
    drop(outbound);
    let _ = writer.await;
    info!(server = %server.host, "session ended");
}

/// One connection: register, hand the writer half to the send worker,
/// then pump inbound events until disconnect or shutdown.
async fn connect_once(
    server: &ServerConfig,
    state: &Arc<BotState>,
    dispatcher: &mut Dispatcher,
    sink_tx: &mpsc::Sender<WriteHalf>,
) -> Result<()> {
    info!(server = %server.host, port = server.port, "connecting");
    let stream = TcpStream::connect(server.address()).await?;
    let mut transport = Transport::tcp(stream);

    register(&mut transport, server, state).await?;
    info!(server = %server.host, nick = %state.nick(), "connected");

    if let Some(identify) = &server.identify {
        state.outbound.privmsg(&identify.target, &identify.message);
        if let Some(mode) = &identify.usermode {
            state.outbound.mode(&state.nick(), mode);
        }
    }

    let (sink, mut stream): (WriteHalf, ReadHalf) = transport.into_framed().split();
    if sink_tx.send(sink).await.is_err() {
        return Err(anyhow!("send worker gone"));
    }

    let joined: Joined = Arc::new(RwLock::new(HashSet::new()));
    let join_task = spawn_join_timer(server, state, Arc::clone(&joined));

    let result = read_loop(&mut stream, state, dispatcher, &joined).await;
    join_task.abort();
    result
}

/// NICK/USER handshake: wait for the welcome numeric, answering PINGs
/// and stepping around nick collisions.
async fn register(
    transport: &mut Transport,
    server: &ServerConfig,
    state: &Arc<BotState>,
) -> Result<()> {
    let mut nick = server.nick.clone();
    transport.write_message(Message::nick(&nick)).await?;
    transport
        .write_message(Message::user(&server.nick, &server.nick))
        .await?;

    loop {
        let message = timeout(REGISTRATION_TIMEOUT, transport.read_message())
            .await
            .map_err(|_| anyhow!("registration timed out"))??
            .ok_or_else(|| anyhow!("connection closed during registration"))?;

        match &message.command {
            // RPL_WELCOME
            Command::Response(1, _) => {
                state.set_nick(&nick);
                return Ok(());
            }
            // ERR_NICKNAMEINUSE
            Command::Response(433, _) => {
                nick.push('_');
                debug!(nick, "nickname in use, retrying");
                transport.write_message(Message::nick(&nick)).await?;
            }
            Command::PING(token, _) => {
                transport.write_message(Message::pong(token)).await?;
            }
            _ => trace!(message = %message.to_string().trim_end(), "pre-welcome"),
        }
    }
}

/// Join configured channels the bot is not currently on; first pass
/// fires immediately, then every [`JOIN_INTERVAL`].
fn spawn_join_timer(server: &ServerConfig, state: &Arc<BotState>, joined: Joined) -> JoinHandle<()> {
    let channels = server.channels.clone();
    let outbound = state.outbound.clone();
    let cancel = state.shutdown.clone();

    tokio::spawn(async move {
        let mut ticker = interval(JOIN_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for channel in &channels {
                        if joined.read().contains(&channel.name.to_lowercase()) {
                            continue;
                        }
                        match channel.key.as_deref() {
                            Some(key) if !key.is_empty() => {
                                outbound.join_with_key(&channel.name, key);
                            }
                            _ => outbound.join(&channel.name),
                        }
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    })
}

async fn read_loop(
    stream: &mut ReadHalf,
    state: &Arc<BotState>,
    dispatcher: &mut Dispatcher,
    joined: &Joined,
) -> Result<()> {
    loop {
        let message = tokio::select! {
            next = stream.next() => match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    warn!(error = %e, "unreadable line");
                    continue;
                }
                None => return Ok(()),
            },
            _ = state.shutdown.cancelled() => return Ok(()),
        };

        handle_event(message, state, dispatcher, joined).await;
    }
}

/// React to one inbound message.
async fn handle_event(
    message: Message,
    state: &Arc<BotState>,
    dispatcher: &mut Dispatcher,
    joined: &Joined,
) {
    let own_nick = state.nick();
    let from_self = message
        .source_nickname()
        .is_some_and(|n| n.eq_ignore_ascii_case(&own_nick));

    match &message.command {
        Command::PING(token, _) => {
            state.outbound.pong(token);
        }

        Command::PRIVMSG(target, text) => {
            let Some(Prefix::Nickname(nick, login, host)) = &message.prefix else {
                return;
            };
            if target.starts_with('#') || target.starts_with('&') {
                dispatcher
                    .handle_message(target, nick, login, host, text)
                    .await;
            } else {
                dispatcher
                    .handle_private_message(nick, login, host, text)
                    .await;
            }
        }

        Command::JOIN(channel, _) if from_self => {
            info!(channel, "joined");
            joined.write().insert(channel.to_lowercase());
        }

        Command::PART(channel, _) if from_self => {
            info!(channel, "left");
            joined.write().remove(&channel.to_lowercase());
        }

        Command::KICK(channel, who, _) => {
            if who.eq_ignore_ascii_case(&own_nick) {
                info!(channel, "kicked");
                joined.write().remove(&channel.to_lowercase());
            }
        }

        Command::NICK(new_nick) if from_self => {
            info!(nick = %new_nick, "nick changed");
            state.set_nick(new_nick);
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn fixture() -> (Arc<BotState>, Dispatcher, Joined, UnboundedReceiver<String>) {
        let config = Config::parse(
            r#"
            [[server]]
            host = "irc.test.example"
            nick = "ember"
            "#,
        )
        .unwrap();
        let server = config.servers[0].clone();

        let (outbound, rx) = Outbound::channel();
        let registry = Arc::new(Registry::new(PluginDeps::from_config(&config)));
        let state = Arc::new(BotState::new(&server, &config, outbound, registry));
        let dispatcher = Dispatcher::new(Arc::clone(&state));
        let joined: Joined = Arc::new(RwLock::new(HashSet::new()));

        (state, dispatcher, joined, rx)
    }

    async fn feed(
        raw: &str,
        state: &Arc<BotState>,
        dispatcher: &mut Dispatcher,
        joined: &Joined,
    ) {
        let message: Message = raw.parse().unwrap();
        handle_event(message, state, dispatcher, joined).await;
    }

    #[tokio::test]
    async fn ping_is_answered_through_the_queue() {
        let (state, mut dispatcher, joined, mut rx) = fixture();

        feed("PING :irc.test.example", &state, &mut dispatcher, &joined).await;
        assert_eq!(rx.try_recv().unwrap(), "PONG :irc.test.example");
    }

    #[tokio::test]
    async fn own_join_and_kick_update_membership() {
        let (state, mut dispatcher, joined, _rx) = fixture();

        feed(
            ":ember!ember@bot.example JOIN #Ember",
            &state,
            &mut dispatcher,
            &joined,
        )
        .await;
        assert!(joined.read().contains("#ember"));

        // Someone else joining leaves our membership alone.
        feed(
            ":alice!alice@host JOIN #other",
            &state,
            &mut dispatcher,
            &joined,
        )
        .await;
        assert!(!joined.read().contains("#other"));

        feed(
            ":op!op@host KICK #ember ember :begone",
            &state,
            &mut dispatcher,
            &joined,
        )
        .await;
        assert!(joined.read().is_empty());
    }

    #[tokio::test]
    async fn nick_echo_updates_own_nick() {
        let (state, mut dispatcher, joined, _rx) = fixture();

        feed(
            ":ember!ember@bot.example NICK ember_",
            &state,
            &mut dispatcher,
            &joined,
        )
        .await;
        assert_eq!(state.nick(), "ember_");
    }
}
