//! Backend control channel: registration, liveness pings, teardown.
//!
//! Backends dial the frontend's control listener, identify the endpoint
//! they serve, and stay registered for exactly as long as the connection
//! answers pings. Membership is connection-scoped: whatever ends the
//! connection removes the replica.

pub mod backend;
pub mod server;
pub mod wire;

use std::io;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::control::wire::Message;
use crate::routing::mux::RouteError;

/// Errors that terminate one control connection. The connection's replica
/// registration, if any, is removed before the error is surfaced.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("dial failed: {0}")]
    Dial(#[source] io::Error),
    #[error("handshake failed: {0}")]
    Handshake(#[source] io::Error),
    #[error("unexpected message: {0:?}")]
    UnexpectedMessage(Message),
    #[error("cannot infer source address: connection has no TCP peer")]
    NoSourceAddress,
    #[error("invalid replica address: {0}")]
    InvalidReplica(#[from] http::uri::InvalidUri),
    #[error(transparent)]
    Registry(#[from] RouteError),
    #[error("ping failed: {0}")]
    Ping(#[source] io::Error),
    #[error("pong decode: {0}")]
    Pong(#[source] io::Error),
    #[error("ping/pong mismatch: nonce = {got}, want {want}")]
    NonceMismatch { got: i64, want: i64 },
}

/// An error kind that means the peer went away rather than misbehaved.
pub(crate) fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

/// Resolves when the shutdown channel fires or its sender is gone.
pub(crate) async fn shutdown_signal(rx: &mut broadcast::Receiver<()>) {
    loop {
        match rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Closed) => return,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
        }
    }
}
