//! Backend side of the control channel.
//!
//! # Responsibilities
//! - Dial the frontend and register the endpoint this process serves
//! - Echo liveness pings until the frontend goes away or lame-duck fires
//!
//! # Design Decisions
//! - The backend never initiates messages after registration; it only
//!   answers, so the frontend's one-outstanding-ping invariant holds

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::control::wire::{Framed, Message};
use crate::control::{is_disconnect, shutdown_signal, ControlError};

/// What the frontend needs to route traffic back to this process.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Endpoint name to join.
    pub name: String,
    /// Advertised host; empty asks the frontend to use the connection's
    /// source address.
    pub host: String,
    /// Port the backend's HTTP server listens on.
    pub port: u16,
}

impl Backend {
    /// Dials the frontend's control listener and runs until the connection
    /// ends or `shutdown` fires.
    pub async fn dial_frontend(
        &self,
        addr: &str,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ControlError> {
        let stream = TcpStream::connect(addr).await.map_err(ControlError::Dial)?;
        self.run(stream, shutdown).await
    }

    /// Registers over an established stream and echoes pings.
    pub async fn run<S>(
        &self,
        stream: S,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ControlError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut framed = Framed::new(stream);
        framed
            .send(&Message::Register {
                name: self.name.clone(),
                host: self.host.clone(),
                port: self.port,
            })
            .await
            .map_err(ControlError::Handshake)?;

        tracing::info!(backend = %self.name, "registered with frontend");

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown_signal(&mut shutdown) => break,
                received = framed.recv() => received,
            };
            match received {
                Ok(Some(ping @ Message::Status { .. })) => {
                    if let Err(err) = framed.send(&ping).await {
                        if is_disconnect(&err) {
                            break;
                        }
                        return Err(ControlError::Ping(err));
                    }
                }
                Ok(Some(msg)) => return Err(ControlError::UnexpectedMessage(msg)),
                Ok(None) => break,
                Err(err) if is_disconnect(&err) => break,
                Err(err) => return Err(ControlError::Pong(err)),
            }
        }

        tracing::info!(backend = %self.name, "frontend connection closed");
        Ok(())
    }
}
