//! Scriptable in-memory [`Transport`].
//!
//! Every call to [`Transport::send`] is recorded together with the paused
//! tokio clock reading, so tests can assert on timeouts and on the spacing of
//! retries. Responses are taken from a script; once the script is exhausted
//! every send succeeds.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;
use ws_echo_testee::{SendOpcode, Transport, TransportError};

/// Scripted response to one send attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendScript {
    /// Accept the payload.
    Accept,
    /// Fail with [`TransportError::Timeout`].
    Timeout,
    /// Fail with [`TransportError::Closed`] and mark the transport
    /// disconnected.
    Close,
}

/// One recorded send attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendAttempt {
    /// Opcode passed to the transport.
    pub opcode: SendOpcode,
    /// Payload passed to the transport.
    pub payload: Vec<u8>,
    /// Timeout passed to the transport.
    pub timeout: Duration,
    /// Clock reading when the attempt started.
    pub at: Instant,
    /// Whether the attempt succeeded.
    pub accepted: bool,
}

#[derive(Debug, Default)]
struct State {
    script: VecDeque<SendScript>,
    attempts: Vec<SendAttempt>,
    disconnect_after: Option<usize>,
    disconnects: usize,
}

/// In-memory transport double.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    state: Mutex<State>,
}

impl Default for MockTransport {
    fn default() -> Self { Self::connected() }
}

impl MockTransport {
    /// A transport that reports an established connection.
    #[must_use]
    pub fn connected() -> Self {
        Self {
            connected: AtomicBool::new(true),
            state: Mutex::new(State::default()),
        }
    }

    /// A transport that reports no connection.
    #[must_use]
    pub fn disconnected() -> Self {
        let transport = Self::connected();
        transport.set_connected(false);
        transport
    }

    /// Wrap the transport in an [`Arc`] for sharing with a connector.
    #[must_use]
    pub fn shared(self) -> Arc<Self> { Arc::new(self) }

    /// Flip the liveness flag.
    pub fn set_connected(&self, connected: bool) { self.connected.store(connected, Ordering::SeqCst); }

    /// Append responses to the script.
    pub fn script(&self, responses: impl IntoIterator<Item = SendScript>) {
        self.lock().script.extend(responses);
    }

    /// Fail the next `count` attempts with a timeout.
    pub fn fail_next(&self, count: usize) {
        self.script(std::iter::repeat_n(SendScript::Timeout, count));
    }

    /// Drop the connection once `attempts` sends have been made.
    pub fn disconnect_after(&self, attempts: usize) { self.lock().disconnect_after = Some(attempts); }

    /// All recorded attempts.
    #[must_use]
    pub fn attempts(&self) -> Vec<SendAttempt> { self.lock().attempts.clone() }

    /// Payloads of successful attempts, in order.
    #[must_use]
    pub fn echoed(&self) -> Vec<(SendOpcode, Vec<u8>)> {
        self.lock()
            .attempts
            .iter()
            .filter(|attempt| attempt.accepted)
            .map(|attempt| (attempt.opcode, attempt.payload.clone()))
            .collect()
    }

    /// Number of times [`Transport::disconnect`] was called.
    #[must_use]
    pub fn disconnects(&self) -> usize { self.lock().disconnects }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn is_connected(&self) -> bool { self.connected.load(Ordering::SeqCst) }

    async fn send(
        &self,
        opcode: SendOpcode,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut state = self.lock();
        let response = state.script.pop_front().unwrap_or(SendScript::Accept);
        state.attempts.push(SendAttempt {
            opcode,
            payload: payload.to_vec(),
            timeout,
            at: Instant::now(),
            accepted: response == SendScript::Accept,
        });
        if state
            .disconnect_after
            .is_some_and(|limit| state.attempts.len() >= limit)
        {
            self.set_connected(false);
        }
        drop(state);

        match response {
            SendScript::Accept => Ok(payload.len()),
            SendScript::Timeout => Err(TransportError::Timeout(timeout)),
            SendScript::Close => {
                self.set_connected(false);
                Err(TransportError::Closed)
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.lock().disconnects += 1;
        self.set_connected(false);
        Ok(())
    }
}
