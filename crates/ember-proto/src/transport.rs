//! Framed IRC transport over TCP.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::warn;

use crate::error::ProtocolError;
use crate::irc::IrcCodec;
use crate::Message;

/// Maximum IRC line length in bytes, including CRLF.
pub const MAX_IRC_LINE_LEN: usize = 512;

/// IRC transport over a TCP stream.
///
/// Use [`read_message`](Transport::read_message) /
/// [`write_message`](Transport::write_message) during registration, then
/// [`into_framed`](Transport::into_framed) to split into reader and
/// writer halves for steady-state operation.
pub struct Transport {
    framed: Framed<TcpStream, IrcCodec>,
}

impl Transport {
    /// Create a transport from a connected TCP stream.
    pub fn tcp(stream: TcpStream) -> Self {
        if let Err(e) = Self::enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }

        Self {
            framed: Framed::new(stream, IrcCodec::new()),
        }
    }

    fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
        use socket2::{SockRef, TcpKeepalive};
        use std::time::Duration;

        let sock = SockRef::from(stream);
        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(120))
            .with_interval(Duration::from_secs(30));

        sock.set_tcp_keepalive(&keepalive)?;
        Ok(())
    }

    /// Read the next IRC message.
    ///
    /// Returns `Ok(None)` when the connection is closed.
    pub async fn read_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        match self.framed.next().await {
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Write an IRC message.
    pub async fn write_message(&mut self, message: Message) -> Result<(), ProtocolError> {
        self.framed.send(message).await
    }

    /// Consume the transport, returning the underlying framed stream so
    /// the caller can split it into reader and writer halves.
    pub fn into_framed(self) -> Framed<TcpStream, IrcCodec> {
        self.framed
    }
}
