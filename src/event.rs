//! Events delivered by the WebSocket transport.

use bytes::Bytes;

use crate::opcode::WireOpcode;

/// One delivery of (part of) a frame from the transport.
///
/// Large frames are read by the transport in chunks and surface as several
/// deliveries sharing the same `total_len`, each with its own `offset`.
/// Protocol-level fragments surface the same way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryEvent {
    /// Wire opcode of the frame.
    pub opcode: WireOpcode,
    /// Bytes of this delivery. `None` models a missing payload pointer.
    pub data: Option<Bytes>,
    /// Declared length of this delivery.
    pub data_len: usize,
    /// Size of the logical frame, or zero when unknown.
    pub total_len: usize,
    /// Position of this delivery within the logical frame.
    pub offset: usize,
    /// Whether this is the last delivery of the message.
    pub is_final: bool,
}

impl DeliveryEvent {
    /// A complete, unfragmented frame.
    #[must_use]
    pub fn frame(opcode: WireOpcode, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            opcode,
            data_len: payload.len(),
            total_len: payload.len(),
            data: Some(payload),
            offset: 0,
            is_final: true,
        }
    }

    /// One chunk of a logical frame of `total_len` bytes starting at `offset`.
    #[must_use]
    pub fn chunk(
        opcode: WireOpcode,
        payload: impl Into<Bytes>,
        total_len: usize,
        offset: usize,
        is_final: bool,
    ) -> Self {
        let payload = payload.into();
        Self {
            opcode,
            data_len: payload.len(),
            total_len,
            data: Some(payload),
            offset,
            is_final,
        }
    }

    /// A delivery that announces `data_len` bytes but carries no payload.
    #[must_use]
    pub const fn without_payload(opcode: WireOpcode, data_len: usize) -> Self {
        Self {
            opcode,
            data: None,
            data_len,
            total_len: data_len,
            offset: 0,
            is_final: true,
        }
    }

    /// Logical frame size, falling back to the chunk length when unset.
    #[must_use]
    pub const fn effective_total_len(&self) -> usize {
        if self.total_len == 0 {
            self.data_len
        } else {
            self.total_len
        }
    }

    /// Whether the delivery is only part of a larger logical message.
    #[must_use]
    pub const fn is_fragmented(&self) -> bool { self.total_len > self.data_len || self.offset > 0 }

    /// Borrow the chunk bytes after validating them against `data_len`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadDefect`] when the payload is missing but announced,
    /// or when its length disagrees with `data_len`.
    pub fn payload(&self) -> Result<&[u8], PayloadDefect> {
        match &self.data {
            None if self.data_len == 0 => Ok(&[][..]),
            None => Err(PayloadDefect::Missing {
                declared: self.data_len,
            }),
            Some(data) if data.len() == self.data_len => Ok(&data[..]),
            Some(data) => Err(PayloadDefect::LengthMismatch {
                declared: self.data_len,
                actual: data.len(),
            }),
        }
    }
}

/// Reasons a delivery's payload cannot be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PayloadDefect {
    /// No payload although `declared` bytes were announced.
    #[error("missing payload with declared length {declared}")]
    Missing {
        /// Announced chunk length.
        declared: usize,
    },
    /// The payload length differs from the announced length.
    #[error("payload of {actual} bytes does not match declared length {declared}")]
    LengthMismatch {
        /// Announced chunk length.
        declared: usize,
        /// Actual payload length.
        actual: usize,
    },
}

/// Notifications emitted by the WebSocket client for one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// The handshake completed.
    Connected,
    /// The connection closed.
    Disconnected,
    /// The transport reported an error and the connection is unusable.
    Error,
    /// The client task finished.
    Finished,
    /// A frame delivery.
    Data(DeliveryEvent),
}

impl ClientEvent {
    /// Whether the event ends the current connection.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error | Self::Finished)
    }
}

impl From<DeliveryEvent> for ClientEvent {
    fn from(event: DeliveryEvent) -> Self { Self::Data(event) }
}
