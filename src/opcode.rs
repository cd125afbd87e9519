//! WebSocket opcode taxonomy used by the echo engine.
//!
//! The transport reports raw wire opcodes. Only continuation, text and binary
//! frames can be echoed; everything at or above
//! [`CONTROL_OPCODE_THRESHOLD`] is a control frame handled by the transport
//! itself.

use std::fmt;

use serde::{Deserialize, Serialize};

/// First opcode value reserved for control frames.
pub const CONTROL_OPCODE_THRESHOLD: u8 = 0x08;

/// Send opcodes indexed by their wire value.
const SEND_OPCODES: [SendOpcode; 3] = [
    SendOpcode::Continuation,
    SendOpcode::Text,
    SendOpcode::Binary,
];

/// Raw opcode as reported by the transport for a delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WireOpcode(u8);

impl WireOpcode {
    /// Continuation frame.
    pub const CONTINUATION: Self = Self(0x0);
    /// Text frame.
    pub const TEXT: Self = Self(0x1);
    /// Binary frame.
    pub const BINARY: Self = Self(0x2);
    /// Close frame.
    pub const CLOSE: Self = Self(0x8);
    /// Ping frame.
    pub const PING: Self = Self(0x9);
    /// Pong frame.
    pub const PONG: Self = Self(0xA);

    /// Wrap a raw opcode value.
    #[must_use]
    pub const fn new(raw: u8) -> Self { Self(raw) }

    /// Return the raw opcode value.
    #[must_use]
    pub const fn get(self) -> u8 { self.0 }

    /// Whether the opcode denotes a control frame.
    #[must_use]
    pub const fn is_control(self) -> bool { self.0 >= CONTROL_OPCODE_THRESHOLD }

    /// Map the wire opcode to the opcode used when echoing it.
    ///
    /// Returns `None` for control frames and reserved data opcodes.
    #[must_use]
    pub fn send_opcode(self) -> Option<SendOpcode> {
        SEND_OPCODES.get(usize::from(self.0)).copied()
    }

    /// Classify the opcode for dispatch.
    #[must_use]
    pub fn classify(self) -> FrameClass {
        if self.is_control() {
            return FrameClass::Control(self);
        }
        self.send_opcode()
            .map_or(FrameClass::Unsupported(self), FrameClass::Data)
    }
}

impl From<u8> for WireOpcode {
    fn from(raw: u8) -> Self { Self(raw) }
}

impl fmt::Display for WireOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "0x{:02X}", self.0) }
}

/// Application opcodes the engine can hand to the transport's send primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SendOpcode {
    /// Continuation of a previously started message.
    Continuation = 0x0,
    /// UTF-8 text message.
    Text = 0x1,
    /// Binary message.
    Binary = 0x2,
}

impl SendOpcode {
    /// Wire value of the opcode.
    #[must_use]
    pub const fn as_u8(self) -> u8 { self as u8 }

    /// Short lower-case name, suitable for log fields and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Continuation => "continuation",
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for SendOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.as_u8())
    }
}

/// Dispatch class of a delivery, derived from its wire opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameClass {
    /// Ping, pong, close or a reserved control opcode.
    Control(WireOpcode),
    /// A data frame that can be echoed with the given opcode.
    Data(SendOpcode),
    /// A reserved non-control opcode the engine does not echo.
    Unsupported(WireOpcode),
}
