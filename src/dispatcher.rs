//! Per-delivery classification, reassembly and echo.
//!
//! [`Dispatcher`] owns the single [`ReassemblyBuffer`] and processes one
//! [`DeliveryEvent`] at a time. Each call to [`Dispatcher::dispatch`] runs to
//! completion, including any echo retries, before the next delivery is
//! accepted; the `&mut self` receiver enforces this.
//!
//! Control frames pass through untouched. Data deliveries are either echoed
//! directly or buffered until their logical message is complete. Every
//! failure resets the buffer and is reported as a [`DispatchOutcome`], never
//! as an error.

use log::{debug, error, warn};

use crate::{
    config::TesteeConfig,
    echo::{EchoSender, SendOutcome},
    event::{DeliveryEvent, PayloadDefect},
    metrics,
    opcode::{FrameClass, SendOpcode, WireOpcode},
    reassembly::{AppendStatus, ReassemblyBuffer, ReassemblyError},
    transport::Transport,
};

/// What happened to a delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The session is not running or the transport is disconnected.
    NotConnected,
    /// A control frame; the transport answers pings itself.
    Control(WireOpcode),
    /// A reserved data opcode that is not echoed.
    Unsupported(WireOpcode),
    /// The payload was missing or did not match its declared length.
    Malformed(PayloadDefect),
    /// The chunk was stored and the message awaits more bytes.
    Buffering {
        /// Bytes received so far.
        received: usize,
        /// Length of the logical message.
        expected: usize,
    },
    /// The partial message was discarded.
    Dropped(ReassemblyError),
    /// A complete message was handed to the echo sender.
    Completed {
        /// Opcode used for the echo.
        opcode: SendOpcode,
        /// Length of the echoed message.
        len: usize,
        /// Whether the message was reassembled from several deliveries.
        reassembled: bool,
        /// Result of the echo.
        send: SendOutcome,
    },
}

impl DispatchOutcome {
    /// Label for deliveries that were discarded, `None` otherwise.
    #[must_use]
    pub const fn drop_reason(&self) -> Option<&'static str> {
        match self {
            Self::NotConnected => Some("not_connected"),
            Self::Unsupported(_) => Some("unsupported_opcode"),
            Self::Malformed(_) => Some("malformed_payload"),
            Self::Dropped(err) => Some(err.as_str()),
            Self::Control(_) | Self::Buffering { .. } | Self::Completed { .. } => None,
        }
    }
}

/// Drives reassembly and echo for a stream of deliveries.
#[derive(Debug, Default)]
pub struct Dispatcher {
    buffer: ReassemblyBuffer,
    sender: EchoSender,
    session_active: bool,
}

impl Dispatcher {
    /// Create a dispatcher around an existing buffer and sender.
    #[must_use]
    pub const fn new(buffer: ReassemblyBuffer, sender: EchoSender) -> Self {
        Self {
            buffer,
            sender,
            session_active: false,
        }
    }

    /// Create a dispatcher from configuration. Storage is allocated lazily.
    #[must_use]
    pub fn from_config(config: &TesteeConfig) -> Self {
        Self::new(
            ReassemblyBuffer::with_capacity(config.capacity),
            EchoSender::new(config.echo),
        )
    }

    /// Allocate the reassembly storage ahead of the first fragmented message.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::OutOfMemory`] if allocation fails; the
    /// buffer falls back to lazy allocation.
    pub fn preallocate(&mut self) -> Result<(), ReassemblyError> { self.buffer.allocate() }

    /// Mark the connection as established.
    pub fn begin_session(&mut self) { self.session_active = true; }

    /// Mark the connection as finished and discard any partial message.
    pub fn end_session(&mut self) {
        self.session_active = false;
        self.buffer.reset();
    }

    /// Whether a connection is currently established.
    #[must_use]
    pub const fn session_active(&self) -> bool { self.session_active }

    /// Reassembly buffer state.
    #[must_use]
    pub const fn buffer(&self) -> &ReassemblyBuffer { &self.buffer }

    /// Free the reassembly storage at final shutdown.
    pub fn release(&mut self) { self.buffer.release(); }

    /// Process one delivery.
    ///
    /// Deliveries received while no session is running, or while the
    /// transport reports a disconnect, are dropped without touching the
    /// reassembly state.
    pub async fn dispatch<T>(&mut self, event: DeliveryEvent, transport: &T) -> DispatchOutcome
    where
        T: Transport + ?Sized,
    {
        debug!(
            "delivery: opcode={} len={} fin={} total_len={} offset={}",
            event.opcode, event.data_len, event.is_final, event.total_len, event.offset
        );

        if !self.session_active || !transport.is_connected() {
            warn!("received data but not connected, ignoring");
            return record(DispatchOutcome::NotConnected);
        }

        let opcode = match event.opcode.classify() {
            FrameClass::Control(op) => {
                if op == WireOpcode::PING {
                    debug!("ping answered by transport");
                }
                return DispatchOutcome::Control(op);
            }
            FrameClass::Unsupported(op) => {
                warn!("unsupported opcode, skipping: opcode={op}");
                return record(DispatchOutcome::Unsupported(op));
            }
            FrameClass::Data(opcode) => opcode,
        };

        let chunk = match event.payload() {
            Ok(chunk) => chunk,
            Err(defect) => {
                error!("unusable delivery payload: opcode={} error={defect}", event.opcode);
                return record(DispatchOutcome::Malformed(defect));
            }
        };

        // An empty delivery with no declared total carries nothing to place
        // and must not disturb a message in progress.
        if !event.is_fragmented() || event.effective_total_len() == 0 {
            let send = self.sender.send_with_retry(opcode, chunk, transport).await;
            return record(DispatchOutcome::Completed {
                opcode,
                len: chunk.len(),
                reassembled: false,
                send,
            });
        }

        match self.assemble(&event, opcode, chunk) {
            Ok(AppendStatus::Incomplete) => {
                debug!(
                    "waiting for more fragments: received={} expected={}",
                    self.buffer.received(),
                    self.buffer.expected_len()
                );
                DispatchOutcome::Buffering {
                    received: self.buffer.received(),
                    expected: self.buffer.expected_len(),
                }
            }
            Ok(AppendStatus::Complete) => {
                let Some(message) = self.buffer.take_completed() else {
                    return record(DispatchOutcome::Dropped(ReassemblyError::Inactive));
                };
                let len = message.payload.len();
                let send = self
                    .sender
                    .send_with_retry(message.opcode, message.payload, transport)
                    .await;
                record(DispatchOutcome::Completed {
                    opcode: message.opcode,
                    len,
                    reassembled: true,
                    send,
                })
            }
            Err(err) => {
                error!(
                    "dropping fragmented message: offset={} chunk={} error={err}",
                    event.offset, event.data_len
                );
                self.buffer.reset();
                record(DispatchOutcome::Dropped(err))
            }
        }
    }

    /// Start, restart or continue the assembly that `event` belongs to.
    ///
    /// A chunk whose total differs from the message in progress discards
    /// that message and re-prepares with the new total. Unless the chunk
    /// starts at offset 0 the fresh message has no prefix, so the contiguity
    /// check drops it straight away and the buffer ends up inactive.
    fn assemble(
        &mut self,
        event: &DeliveryEvent,
        opcode: SendOpcode,
        chunk: &[u8],
    ) -> Result<AppendStatus, ReassemblyError> {
        let total_len = event.effective_total_len();

        if event.offset == 0 || !self.buffer.is_active() {
            self.buffer.prepare(total_len, opcode)?;
        } else if total_len != self.buffer.expected_len() {
            warn!(
                "payload length changed mid-message, resetting: previous={} current={total_len}",
                self.buffer.expected_len()
            );
            self.buffer.reset();
            self.buffer.prepare(total_len, opcode)?;
        }

        self.buffer.ensure_contiguous(event.offset)?;
        self.buffer.append(event.offset, chunk)
    }
}

fn record(outcome: DispatchOutcome) -> DispatchOutcome {
    if let Some(reason) = outcome.drop_reason() {
        metrics::inc_dropped(reason);
    }
    outcome
}
