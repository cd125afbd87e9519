//! Scripted [`Connector`] that hands out prepared connections in order.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use ws_echo_testee::{ClientEvent, Connector, TransportError};

use crate::MockTransport;

/// A prepared connection: the transport plus the events it will emit.
#[derive(Debug)]
pub struct ScriptedConnection {
    transport: Arc<MockTransport>,
    events: Vec<ClientEvent>,
    hang: bool,
}

impl ScriptedConnection {
    /// A connection that emits `events` and then ends its stream.
    #[must_use]
    pub fn new(transport: Arc<MockTransport>, events: Vec<ClientEvent>) -> Self {
        Self {
            transport,
            events,
            hang: false,
        }
    }

    /// Keep the stream open forever after the scripted events.
    #[must_use]
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }
}

/// Connector returning scripted connections; fails once they run out.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    connections: VecDeque<ScriptedConnection>,
    uris: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    /// Connector serving `connections` in order.
    #[must_use]
    pub fn new(connections: impl IntoIterator<Item = ScriptedConnection>) -> Self {
        Self {
            connections: connections.into_iter().collect(),
            uris: Arc::default(),
        }
    }

    /// Shared log of every URI passed to `connect`, including failed ones.
    #[must_use]
    pub fn uris(&self) -> Arc<Mutex<Vec<String>>> { Arc::clone(&self.uris) }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Transport = Arc<MockTransport>;
    type Events = BoxStream<'static, ClientEvent>;

    async fn connect(
        &mut self,
        uri: &str,
    ) -> Result<(Self::Transport, Self::Events), TransportError> {
        self.uris
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(uri.to_owned());

        let Some(connection) = self.connections.pop_front() else {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "no scripted connection left",
            )));
        };
        let events = stream::iter(connection.events);
        let events = if connection.hang {
            events.chain(stream::pending()).boxed()
        } else {
            events.boxed()
        };
        Ok((connection.transport, events))
    }
}
