//! Outbound line queue and the single send worker.
//!
//! Every outbound IRC line goes through one FIFO drained by one worker
//! task, which is the sole caller of the [`RateGate`]. Producers enqueue
//! fully formed protocol lines through a cloneable [`Outbound`] handle;
//! embedded line breaks are stripped at enqueue time.

use ember_proto::IrcCodec;
use futures_util::stream::SplitSink;
use futures_util::{Sink, SinkExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::throttle::RateGate;

/// How long the worker waits before re-testing a denied head line.
/// Intentional bounded-sleep backpressure, not a spin.
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Writer half of a framed IRC connection, carrying raw lines.
pub type WriteHalf = SplitSink<Framed<TcpStream, IrcCodec>, String>;

/// Producer handle for the outbound queue.
///
/// Cheap to clone; any task may enqueue. Lines are delivered in enqueue
/// order by a single worker.
#[derive(Clone, Debug)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<String>,
}

impl Outbound {
    /// Create the queue, returning the producer handle and the receiver
    /// to hand to [`send_worker`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a raw protocol line.
    pub fn raw(&self, line: impl Into<String>) {
        let line = sanitize(line.into());
        trace!(line = %line, "enqueue");
        if self.tx.send(line).is_err() {
            debug!("send queue closed, dropping line");
        }
    }

    /// Enqueue a PRIVMSG to a target.
    pub fn privmsg(&self, target: &str, text: &str) {
        self.raw(format!("PRIVMSG {target} :{text}"));
    }

    /// Enqueue a NOTICE to a target.
    pub fn notice(&self, target: &str, text: &str) {
        self.raw(format!("NOTICE {target} :{text}"));
    }

    /// Enqueue a MODE change.
    pub fn mode(&self, target: &str, mode: &str) {
        self.raw(format!("MODE {target} {mode}"));
    }

    /// Enqueue a JOIN.
    pub fn join(&self, channel: &str) {
        self.raw(format!("JOIN {channel}"));
    }

    /// Enqueue a JOIN with a channel key.
    pub fn join_with_key(&self, channel: &str, key: &str) {
        self.raw(format!("JOIN {channel} {key}"));
    }

    /// Enqueue a PART.
    pub fn part(&self, channel: &str) {
        self.raw(format!("PART {channel}"));
    }

    /// Enqueue a nick change.
    pub fn nick(&self, nick: &str) {
        self.raw(format!("NICK {nick}"));
    }

    /// Enqueue a QUIT.
    pub fn quit(&self, message: &str) {
        self.raw(format!("QUIT :{message}"));
    }

    /// Enqueue a PONG reply.
    pub fn pong(&self, token: &str) {
        self.raw(format!("PONG :{token}"));
    }
}

/// Strip embedded line endings so a crafted argument cannot smuggle a
/// second protocol line into the stream.
fn sanitize(line: String) -> String {
    if line.contains(['\r', '\n']) {
        line.replace(['\r', '\n'], "")
    } else {
        line
    }
}

/// Drain the outbound queue through the rate gate to the wire.
///
/// Strict FIFO: a denied head line blocks the queue until the gate
/// admits it. The session loop delivers a fresh sink on every reconnect;
/// the worker adopts the newest one while idle, and a failed write keeps
/// the line and waits for the replacement, so no line is dropped or
/// reordered. The worker exits once the line queue closes and drains.
pub async fn send_worker<S>(
    mut lines: mpsc::UnboundedReceiver<String>,
    mut sinks: mpsc::Receiver<S>,
    mut gate: RateGate,
) where
    S: Sink<String> + Unpin,
    S::Error: std::fmt::Display,
{
    let Some(mut sink) = sinks.recv().await else {
        return;
    };
    let mut sinks_open = true;

    loop {
        // Pick up the head line, swapping in any newer sink first.
        let line = loop {
            if sinks_open {
                tokio::select! {
                    biased;
                    next = sinks.recv() => {
                        match next {
                            Some(next) => sink = next,
                            None => sinks_open = false,
                        }
                        continue;
                    }
                    line = lines.recv() => match line {
                        Some(line) => break line,
                        None => return,
                    },
                }
            } else {
                match lines.recv().await {
                    Some(line) => break line,
                    None => return,
                }
            }
        };

        while !gate.check(line.len(), Instant::now()) {
            sleep(RETRY_INTERVAL).await;
        }

        loop {
            match sink.send(line.clone()).await {
                Ok(()) => break,
                Err(e) => {
                    debug!(error = %e, "write failed, waiting for reconnect");
                    match sinks.recv().await {
                        Some(next) => sink = next,
                        None => return,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};

    /// Collects sent lines; optionally fails every write.
    struct TestSink {
        sent: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Sink<String> for TestSink {
        type Error = std::io::Error;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
            if self.fail {
                return Err(std::io::Error::other("sink down"));
            }
            self.sent.lock().unwrap().push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn sanitize_strips_line_breaks() {
        assert_eq!(
            sanitize("PRIVMSG #c :hi\r\nQUIT :bye".into()),
            "PRIVMSG #c :hiQUIT :bye"
        );
        assert_eq!(sanitize("PRIVMSG #c :clean".into()), "PRIVMSG #c :clean");
    }

    #[test]
    fn privmsg_formats_wire_line() {
        let (outbound, mut rx) = Outbound::channel();
        outbound.privmsg("#chan", "hello there");
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #chan :hello there");
    }

    #[test]
    fn enqueue_sanitizes_arguments() {
        let (outbound, mut rx) = Outbound::channel();
        outbound.privmsg("#chan", "hi\r\nJOIN #evil");
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #chan :hiJOIN #evil");
    }

    #[tokio::test(start_paused = true)]
    async fn worker_preserves_enqueue_order() {
        let (outbound, rx) = Outbound::channel();
        let (sink_tx, sink_rx) = mpsc::channel(1);
        let sent = Arc::new(Mutex::new(Vec::new()));

        sink_tx
            .send(TestSink {
                sent: Arc::clone(&sent),
                fail: false,
            })
            .await
            .unwrap();

        // 8 lines exceed the burst allowance, forcing denied-head waits.
        for i in 0..8 {
            outbound.raw(format!("PRIVMSG #chan :line {i}"));
        }
        drop(outbound);

        send_worker(rx, sink_rx, RateGate::new(Instant::now())).await;

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 8);
        for (i, line) in sent.iter().enumerate() {
            assert_eq!(line, &format!("PRIVMSG #chan :line {i}"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn worker_retries_line_on_replacement_sink() {
        let (outbound, rx) = Outbound::channel();
        let (sink_tx, sink_rx) = mpsc::channel(2);
        let sent = Arc::new(Mutex::new(Vec::new()));

        sink_tx
            .send(TestSink {
                sent: Arc::clone(&sent),
                fail: true,
            })
            .await
            .unwrap();

        outbound.raw("PRIVMSG #chan :survives reconnect");
        drop(outbound);

        // The replacement arrives only after the first write has failed,
        // as it would on a real reconnect.
        let replace = async {
            sleep(Duration::from_millis(100)).await;
            sink_tx
                .send(TestSink {
                    sent: Arc::clone(&sent),
                    fail: false,
                })
                .await
                .unwrap();
            drop(sink_tx);
        };

        tokio::join!(
            send_worker(rx, sink_rx, RateGate::new(Instant::now())),
            replace
        );

        assert_eq!(
            sent.lock().unwrap().as_slice(),
            ["PRIVMSG #chan :survives reconnect"]
        );
    }
}
