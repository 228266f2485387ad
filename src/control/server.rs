//! Frontend side of the control channel.
//!
//! # Responsibilities
//! - Accept control connections and run one task per connection
//! - Handshake, register the replica, then probe liveness forever
//! - Remove the replica on every exit path
//!
//! # State machine, per connection
//! ```text
//! Connecting → Registering → Active → Closed
//!
//! Registering → Active: Register frame decoded, replica added
//! Active:               sleep(jittered) → Status{nonce} → echo verified
//! Active → Closed:      EOF, shutdown, or any error; replica removed
//! ```
//!
//! # Design Decisions
//! - No read deadline: the channel sits idle between pings by design, and
//!   liveness comes from the ping itself
//! - Pings are strictly serialized; at most one is outstanding
//! - An accept error is fatal for the accept loop; a connection error is
//!   logged and isolated

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::control::wire::{Framed, Message};
use crate::control::{is_disconnect, shutdown_signal, ControlError};
use crate::lifecycle::Shutdown;
use crate::proxy::endpoint::Replica;
use crate::proxy::frontend::Frontend;

impl Frontend {
    /// Accepts control connections until the listener fails or shutdown
    /// fires, spawning an independent handler per connection.
    pub async fn serve_backends(
        self: &Arc<Self>,
        listener: TcpListener,
        ping_delay: Duration,
        shutdown: &Shutdown,
    ) -> io::Result<()> {
        let mut stop = shutdown.subscribe();
        loop {
            tokio::select! {
                biased;
                _ = shutdown_signal(&mut stop) => return Ok(()),
                accepted = listener.accept() => {
                    let (conn, peer) = accepted?;
                    let frontend = Arc::clone(self);
                    let conn_shutdown = shutdown.subscribe();
                    tokio::spawn(async move {
                        if let Err(err) = frontend
                            .serve_backend(conn, Some(peer), ping_delay, conn_shutdown)
                            .await
                        {
                            tracing::debug!(peer = %peer, error = %err, "backend connection failed");
                        }
                    });
                }
            }
        }
    }

    /// Runs the control-channel state machine for one connection. Generic
    /// over the stream so tests drive it through in-memory pipes; `peer` is
    /// the TCP peer address when there is one.
    pub async fn serve_backend<S>(
        &self,
        stream: S,
        peer: Option<SocketAddr>,
        ping_delay: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ControlError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut framed = Framed::new(stream);

        let (name, host, port) = match framed.recv().await {
            Ok(Some(Message::Register { name, host, port })) => (name, host, port),
            Ok(Some(msg)) => return Err(ControlError::UnexpectedMessage(msg)),
            Ok(None) => {
                return Err(ControlError::Handshake(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before registration",
                )))
            }
            Err(err) => return Err(ControlError::Handshake(err)),
        };

        tracing::info!(backend = %name, peer = ?peer, "backend connecting");

        let host = if host.is_empty() {
            peer.ok_or(ControlError::NoSourceAddress)?.ip().to_string()
        } else {
            host
        };
        let replica = Replica::new(&host, port)?;

        self.add_backend(&name, Arc::clone(&replica))?;
        let result = self.ping_loop(&mut framed, ping_delay, &mut shutdown).await;
        self.del_backend(&name, &replica);
        result
    }

    async fn ping_loop<S>(
        &self,
        framed: &mut Framed<S>,
        ping_delay: Duration,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ControlError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_signal(shutdown) => return Ok(()),
                _ = self.sleepish().sleep(ping_delay) => {}
            }

            let nonce = rand::thread_rng().gen_range(0..i64::MAX);
            let start = Instant::now();
            if let Err(err) = framed.send(&Message::Status { nonce }).await {
                if is_disconnect(&err) {
                    return Ok(());
                }
                return Err(ControlError::Ping(err));
            }

            let pong = tokio::select! {
                biased;
                _ = shutdown_signal(shutdown) => return Ok(()),
                received = framed.recv() => received,
            };
            match pong {
                Ok(Some(Message::Status { nonce: got })) => {
                    tracing::debug!(elapsed = ?start.elapsed(), "ping time");
                    if got != nonce {
                        return Err(ControlError::NonceMismatch { got, want: nonce });
                    }
                }
                Ok(Some(msg)) => return Err(ControlError::UnexpectedMessage(msg)),
                Ok(None) => return Ok(()),
                Err(err) if is_disconnect(&err) => return Ok(()),
                Err(err) => return Err(ControlError::Pong(err)),
            }
        }
    }
}
