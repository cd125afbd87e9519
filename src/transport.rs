//! Seam between the echo engine and the WebSocket client.
//!
//! The engine never frames, masks or reads sockets itself. It needs a
//! liveness probe and a timed send primitive for the current connection,
//! and a way to open connections when sequencing a suite.

use std::{io, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::Stream;

use crate::{event::ClientEvent, opcode::SendOpcode};

/// Errors reported by a [`Transport`] or [`Connector`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The send did not complete within the allotted time.
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    /// The connection is closed.
    #[error("connection closed")]
    Closed,
    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Handle to an established WebSocket connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether the connection is currently established.
    fn is_connected(&self) -> bool;

    /// Send one complete message with the given opcode.
    ///
    /// Implementations set the FIN bit and may split large payloads into
    /// several transport chunks; `timeout` applies to each chunk.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the message could not be written
    /// within `timeout` or the connection is gone.
    async fn send(
        &self,
        opcode: SendOpcode,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the close handshake cannot be started.
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn is_connected(&self) -> bool { (**self).is_connected() }

    async fn send(
        &self,
        opcode: SendOpcode,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        (**self).send(opcode, payload, timeout).await
    }

    async fn disconnect(&self) -> Result<(), TransportError> { (**self).disconnect().await }
}

/// Opens client connections for individual test cases.
#[async_trait]
pub trait Connector: Send {
    /// Connection handle type.
    type Transport: Transport;
    /// Stream of events for one connection.
    type Events: Stream<Item = ClientEvent> + Send + Unpin;

    /// Connect to `uri`, returning the handle and its event stream.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the client cannot be started.
    async fn connect(&mut self, uri: &str) -> Result<(Self::Transport, Self::Events), TransportError>;
}
